use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use grammers_client::types::{Chat, Downloadable, Media, Message};
use grammers_client::grammers_tl_types as tl;
use grammers_client::{Client, Config, SignInError, Update};
use grammers_session::{PackedType, Session};
use tracing::{debug, error, info, warn};

use crate::config::TelegramConfig;
use crate::platform::{ChatKind, IncomingMessage};
use crate::relay::Relay;
use crate::watch::{marked_channel_id, WatchSet};

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut buf = String::new();
    io::stdin()
        .read_line(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf.trim().to_owned())
}

fn save_session(client: &Client, path: &Path) -> Result<()> {
    client
        .session()
        .save_to_file(path)
        .with_context(|| format!("Failed to save session file: {}", path.display()))
}

/// Connect to Telegram, signing in interactively when the session is new.
pub async fn connect(config: &TelegramConfig) -> Result<Client> {
    info!("Connecting to Telegram...");

    let session = Session::load_file_or_create(&config.session_file).with_context(|| {
        format!(
            "Failed to load session file: {}",
            config.session_file.display()
        )
    })?;

    let client = Client::connect(Config {
        session,
        api_id: config.api_id,
        api_hash: config.api_hash.clone(),
        params: Default::default(),
    })
    .await
    .context("Failed to connect to Telegram")?;

    if !client
        .is_authorized()
        .await
        .context("Failed to check authorization")?
    {
        sign_in(&client, &config.phone).await?;
        save_session(&client, &config.session_file)?;
        info!("Session saved to {}", config.session_file.display());
    }

    Ok(client)
}

async fn sign_in(client: &Client, phone: &str) -> Result<()> {
    info!("Signing in as {}", phone);
    let token = client
        .request_login_code(phone)
        .await
        .context("Failed to request login code")?;
    let code = prompt("Enter the code you received: ")?;

    match client.sign_in(&token, &code).await {
        Ok(_) => {}
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Enter the password (hint: {hint}): "))?;
            client
                .check_password(password_token, password.trim())
                .await
                .context("Two-step verification failed")?;
        }
        Err(e) => return Err(e).context("Sign in failed"),
    }

    info!("Signed in successfully");
    Ok(())
}

/// Marked id of a raw chat object returned by the API.
fn marked_chat_id(chat: &tl::enums::Chat) -> i64 {
    match chat {
        tl::enums::Chat::Empty(c) => -c.id,
        tl::enums::Chat::Chat(c) => -c.id,
        tl::enums::Chat::Forbidden(c) => -c.id,
        tl::enums::Chat::Channel(c) => marked_channel_id(c.id),
        tl::enums::Chat::ChannelForbidden(c) => marked_channel_id(c.id),
    }
}

/// Look up the chats behind invite links the account has already joined and
/// watch them by id. Fails when nothing watchable remains.
pub async fn resolve_invites(client: &Client, channels: WatchSet) -> Result<WatchSet> {
    let pending = channels.pending_invites();
    if pending.is_empty() {
        return Ok(channels);
    }

    let mut resolved = HashMap::new();
    for hash in pending {
        let request = tl::functions::messages::CheckChatInvite { hash: hash.clone() };
        match client.invoke(&request).await {
            Ok(tl::enums::ChatInvite::Already(invite)) => {
                let chat_id = marked_chat_id(&invite.chat);
                info!("Monitoring private chat (ID: {}) from invite link", chat_id);
                resolved.insert(hash, chat_id);
            }
            Ok(_) => {
                error!(
                    "Invite link +{} points to a chat this account has not joined. \
                     Join it in Telegram first",
                    hash
                );
            }
            Err(e) => error!("Could not resolve invite link +{}: {}", hash, e),
        }
    }

    let channels = channels.resolve_invites(&resolved);
    if channels.is_empty() {
        anyhow::bail!("No valid channels could be resolved. Please check your channel links.");
    }
    Ok(channels)
}

/// Classify a chat and compute its marked id.
fn chat_kind_and_id(chat: &Chat) -> (ChatKind, i64) {
    match chat.pack().ty {
        PackedType::User | PackedType::Bot => (ChatKind::Private, chat.id()),
        PackedType::Chat => (ChatKind::Group, -chat.id()),
        PackedType::Megagroup | PackedType::Broadcast | PackedType::Gigagroup => {
            (ChatKind::Channel, marked_channel_id(chat.id()))
        }
    }
}

fn to_incoming(message: &Message) -> IncomingMessage {
    let chat = message.chat();
    let (kind, chat_id) = chat_kind_and_id(&chat);
    let title = match &chat {
        Chat::User(user) => user.full_name(),
        _ => chat.name().to_string(),
    };

    IncomingMessage {
        chat_id,
        kind,
        handle: chat.username().map(str::to_string),
        title,
        text: message.text().to_string(),
        message_id: Some(message.id()),
        date: message.date(),
        has_photo: matches!(message.media(), Some(Media::Photo(_))),
        photo: None,
    }
}

async fn download_photo(client: &Client, message: &Message) -> Result<Option<Vec<u8>>> {
    let Some(media @ Media::Photo(_)) = message.media() else {
        return Ok(None);
    };

    let mut bytes = Vec::new();
    let mut download = client.iter_download(&Downloadable::Media(media));
    while let Some(chunk) = download
        .next()
        .await
        .context("Failed to download photo")?
    {
        bytes.extend(chunk);
    }
    Ok(Some(bytes))
}

async fn handle_message(client: &Client, relay: &Relay, message: &Message) {
    let mut incoming = to_incoming(message);

    // Only pay for the download when the message will be forwarded
    if incoming.has_photo && relay.accepts(&incoming) {
        debug!("Message {} contains a photo", message.id());
        match download_photo(client, message).await {
            Ok(photo) => incoming.photo = photo,
            Err(e) => error!("Error processing photo: {:#}", e),
        }
    }

    relay.handle(&incoming).await;
}

async fn handle_update(client: &Client, relay: &Relay, update: Update) {
    if let Update::NewMessage(message) = update {
        handle_message(client, relay, &message).await;
    }
}

/// Pull and handle items until `shutdown` resolves or `next` fails.
///
/// `shutdown` is created once and polled across iterations, so a signal that
/// arrives while `handle` is running still stops the loop.
async fn listen<T, E, S, N, NF, H, HF>(shutdown: S, mut next: N, mut handle: H) -> Result<(), E>
where
    S: Future,
    N: FnMut() -> NF,
    NF: Future<Output = Result<T, E>>,
    H: FnMut(T) -> HF,
    HF: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let item = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Relay stopped by user");
                return Ok(());
            }
            item = next() => item?,
        };
        handle(item).await;
    }
}

/// Listen for new messages until Ctrl+C or until the connection is lost.
pub async fn run(client: Client, relay: &Relay, session_file: &Path) -> Result<()> {
    info!("Listening for messages. Press Ctrl+C to stop");

    let client_ref = &client;
    let result = listen(
        tokio::signal::ctrl_c(),
        move || client_ref.next_update(),
        move |update| handle_update(client_ref, relay, update),
    )
    .await
    .map_err(|e| {
        warn!("Telegram update stream ended: {}", e);
        anyhow::Error::new(e).context("Lost connection to Telegram")
    });

    save_session(&client, session_file)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marked_chat_id_for_basic_group() {
        let chat = tl::enums::Chat::Empty(tl::types::ChatEmpty { id: 4242 });
        assert_eq!(marked_chat_id(&chat), -4242);
    }

    #[tokio::test]
    async fn test_shutdown_during_handling_stops_loop() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);
        let mut handled = 0;

        let result: Result<(), std::io::Error> = listen(
            rx,
            || async { Ok(1u32) },
            |_item| {
                handled += 1;
                // Shutdown fires while the first item is still being handled
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                async {}
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(handled, 1);
    }

    #[tokio::test]
    async fn test_listen_stops_on_source_error() {
        let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut remaining = 2;
        let mut handled = 0;

        let result = listen(
            rx,
            || {
                remaining -= 1;
                let item = if remaining >= 0 {
                    Ok(remaining)
                } else {
                    Err(std::io::Error::other("connection reset"))
                };
                async move { item }
            },
            |_item| {
                handled += 1;
                async {}
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(handled, 2);
    }
}
