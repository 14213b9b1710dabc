use std::sync::Arc;

use tracing::{debug, error, info};

use crate::discord::{
    Attachment, Embed, EmbedFooter, EmbedImage, WebhookPayload, WebhookSink,
    EMBED_DESCRIPTION_LIMIT, EMBED_FOOTER_LIMIT, EMBED_TITLE_LIMIT,
};
use crate::platform::IncomingMessage;
use crate::watch::WatchSet;

/// Outcome of handling one incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Chat is not watched
    Skipped,
    Delivered,
    /// Send failed; the message is dropped
    Failed,
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Matches incoming messages against the watch set and relays hits to a webhook
pub struct Relay {
    watch: WatchSet,
    sink: Arc<dyn WebhookSink>,
    embed_color: u32,
}

impl Relay {
    pub fn new(watch: WatchSet, sink: Arc<dyn WebhookSink>, embed_color: u32) -> Self {
        Self {
            watch,
            sink,
            embed_color,
        }
    }

    pub fn accepts(&self, msg: &IncomingMessage) -> bool {
        self.watch.matches(msg)
    }

    /// Build the embed for a message. `image` references an uploaded attachment.
    pub fn build_payload(&self, msg: &IncomingMessage, image: Option<&Attachment>) -> WebhookPayload {
        let source = msg.source_name();

        let description = if msg.text.is_empty() {
            if msg.has_photo {
                "📷 Image".to_string()
            } else {
                "[No text content]".to_string()
            }
        } else {
            truncate_chars(&msg.text, EMBED_DESCRIPTION_LIMIT).to_string()
        };

        let title = format!("New message from {}", source);
        let footer = format!("Source: {}", source);

        WebhookPayload {
            embeds: vec![Embed {
                title: truncate_chars(&title, EMBED_TITLE_LIMIT).to_string(),
                description,
                url: msg.permalink(),
                timestamp: msg.date.to_rfc3339(),
                color: self.embed_color,
                footer: EmbedFooter {
                    text: truncate_chars(&footer, EMBED_FOOTER_LIMIT).to_string(),
                },
                image: image.map(|a| EmbedImage { url: a.embed_url() }),
            }],
        }
    }

    /// Send one message to the webhook. A failed photo upload falls back to
    /// the text-only embed once; any other failure drops the message.
    pub async fn forward(&self, msg: &IncomingMessage) -> Delivery {
        let source = msg.source_name();
        let preview = truncate_chars(&msg.text, 50);
        info!(
            "New message from {} ({:?}, ID: {}): {}",
            source, msg.kind, msg.chat_id, preview
        );

        if let Some(bytes) = &msg.photo {
            let attachment = Attachment::jpeg(bytes.clone());
            let payload = self.build_payload(msg, Some(&attachment));
            match self.sink.deliver(&payload, Some(&attachment)).await {
                Ok(()) => {
                    info!(
                        "Successfully forwarded message with image to Discord from {}",
                        source
                    );
                    return Delivery::Delivered;
                }
                Err(e) => {
                    error!("Error sending photo to Discord: {:#}", e);
                }
            }
        }

        let payload = self.build_payload(msg, None);
        match self.sink.deliver(&payload, None).await {
            Ok(()) => {
                info!("Successfully forwarded message to Discord from {}", source);
                Delivery::Delivered
            }
            Err(e) => {
                error!("Failed to forward message from {}: {:#}", source, e);
                Delivery::Failed
            }
        }
    }

    pub async fn handle(&self, msg: &IncomingMessage) -> Delivery {
        if !self.accepts(msg) {
            debug!("Ignoring message from unwatched chat {}", msg.chat_id);
            return Delivery::Skipped;
        }
        self.forward(msg).await
    }
}
