mod config;
mod discord;
mod platform;
mod relay;
mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::discord::DiscordWebhook;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the variables may come from the real environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Session file: {}", config.telegram.session_file.display());
    info!("  Monitoring {} channel(s)", config.channels.len());
    for entry in config.channels.entries() {
        info!("    - {}", entry);
    }

    let client = platform::telegram::connect(&config.telegram).await?;
    let channels = platform::telegram::resolve_invites(&client, config.channels.clone()).await?;
    info!("Watching {} chat(s)", channels.len());

    let webhook = Arc::new(DiscordWebhook::new(config.discord.webhook_url.clone()));
    let relay = Relay::new(channels, webhook, config.discord.embed_color);

    platform::telegram::run(client, &relay, &config.telegram.session_file).await?;

    Ok(())
}
