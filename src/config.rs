use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::watch::WatchSet;

pub const API_ID_VAR: &str = "TELEGRAM_API_ID";
pub const API_HASH_VAR: &str = "TELEGRAM_API_HASH";
pub const PHONE_VAR: &str = "TELEGRAM_PHONE";
pub const WEBHOOK_URL_VAR: &str = "DISCORD_WEBHOOK_URL";
pub const CHANNELS_VAR: &str = "MONITORED_CHANNELS";
pub const SESSION_FILE_VAR: &str = "SESSION_FILE";
pub const EMBED_COLOR_VAR: &str = "EMBED_COLOR";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    pub session_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub embed_color: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub discord: DiscordConfig,
    pub channels: WatchSet,
}

fn default_session_file() -> PathBuf {
    PathBuf::from("telegram_selfbot.session")
}

fn default_embed_color() -> u32 {
    5814783
}

/// Parse a color given as a decimal integer or `#rrggbb`.
fn parse_color(value: &str) -> Result<u32> {
    let value = value.trim();
    let color = match value.strip_prefix('#') {
        Some(hex) => u32::from_str_radix(hex, 16)
            .with_context(|| format!("Invalid hex color: {}", value))?,
        None => value
            .parse::<u32>()
            .with_context(|| format!("Invalid color: {}", value))?,
    };
    if color > 0xFF_FF_FF {
        anyhow::bail!("Color out of range (max #ffffff): {}", value);
    }
    Ok(color)
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            optional(key).with_context(|| {
                format!(
                    "Missing required environment variable {}. Please check your .env file.",
                    key
                )
            })
        };

        let api_id_raw = required(API_ID_VAR)?;
        let api_id = api_id_raw
            .parse::<i32>()
            .with_context(|| format!("{} must be an integer, got '{}'", API_ID_VAR, api_id_raw))?;
        let api_hash = required(API_HASH_VAR)?;
        let phone = required(PHONE_VAR)?;
        let webhook_url = required(WEBHOOK_URL_VAR)?;
        let channels_raw = required(CHANNELS_VAR)?;

        let channels = WatchSet::parse(&channels_raw);
        if channels.is_empty() {
            anyhow::bail!(
                "No channels specified in {}. Please add at least one channel.",
                CHANNELS_VAR
            );
        }

        let session_file = optional(SESSION_FILE_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(default_session_file);
        let embed_color = match optional(EMBED_COLOR_VAR) {
            Some(raw) => parse_color(&raw).with_context(|| format!("Invalid {}", EMBED_COLOR_VAR))?,
            None => default_embed_color(),
        };

        Ok(Config {
            telegram: TelegramConfig {
                api_id,
                api_hash,
                phone,
                session_file,
            },
            discord: DiscordConfig {
                webhook_url,
                embed_color,
            },
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (API_ID_VAR, "12345"),
            (API_HASH_VAR, "abcdef0123456789"),
            (PHONE_VAR, "+15551234567"),
            (WEBHOOK_URL_VAR, "https://discord.com/api/webhooks/1/token"),
            (CHANNELS_VAR, "@news, Random Channel"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_loads_complete_environment() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.telegram.api_id, 12345);
        assert_eq!(config.telegram.phone, "+15551234567");
        assert_eq!(config.channels.len(), 2);
        assert_eq!(
            config.telegram.session_file,
            PathBuf::from("telegram_selfbot.session")
        );
        assert_eq!(config.discord.embed_color, 5814783);
    }

    #[test]
    fn test_each_required_variable_is_enforced() {
        for key in [API_ID_VAR, API_HASH_VAR, PHONE_VAR, WEBHOOK_URL_VAR, CHANNELS_VAR] {
            let mut env = base_env();
            env.remove(key);
            let err = load(&env).unwrap_err();
            assert!(err.to_string().contains(key), "error should name {}", key);
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert(API_HASH_VAR, "   ");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_empty_channel_list_rejected() {
        let mut env = base_env();
        env.insert(CHANNELS_VAR, " , ,");
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("No channels specified"));
    }

    #[test]
    fn test_unusable_channels_only_rejected() {
        let mut env = base_env();
        env.insert(CHANNELS_VAR, "https://t.me/c/notanid/1, @");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_invite_only_list_loads_pending() {
        let mut env = base_env();
        env.insert(CHANNELS_VAR, "https://t.me/+AbCdEfGh");
        let config = load(&env).unwrap();
        assert_eq!(config.channels.pending_invites(), vec!["AbCdEfGh".to_string()]);
    }

    #[test]
    fn test_non_numeric_api_id_rejected() {
        let mut env = base_env();
        env.insert(API_ID_VAR, "abc");
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_optional_overrides() {
        let mut env = base_env();
        env.insert(SESSION_FILE_VAR, "/data/relay.session");
        env.insert(EMBED_COLOR_VAR, "#ff0000");
        let config = load(&env).unwrap();
        assert_eq!(
            config.telegram.session_file,
            PathBuf::from("/data/relay.session")
        );
        assert_eq!(config.discord.embed_color, 0xff0000);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("5814783").unwrap(), 5814783);
        assert_eq!(parse_color("#58b9ff").unwrap(), 0x58b9ff);
        assert!(parse_color("#1000000").is_err());
        assert!(parse_color("blue").is_err());
    }
}
