//! tgrelay setup wizard.
//!
//! Prompts for the Telegram API credentials, the Discord webhook URL and the
//! chats to watch, then writes them to `.env` in the project root. The relay
//! reads that file on startup.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// ── Env formatting ─────────────────────────────────────────────────────────────

struct EnvParams<'a> {
    api_id: &'a str,
    api_hash: &'a str,
    phone: &'a str,
    webhook_url: &'a str,
    channels: &'a str,
    session_file: &'a str,
}

/// Quote a value only when dotenv parsing would otherwise mangle it.
fn quote(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '$' | '\\'));
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_owned()
    }
}

/// Produces the `.env` contents. Extracted so it can be unit-tested.
fn format_env(p: &EnvParams<'_>) -> String {
    let channels: Vec<&str> = p
        .channels
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let channels = quote(&channels.join(","));

    let session_line = if p.session_file.is_empty() {
        "# SESSION_FILE=telegram_selfbot.session".to_owned()
    } else {
        format!("SESSION_FILE={}", quote(p.session_file))
    };

    let api_id = p.api_id;
    let api_hash = quote(p.api_hash);
    let phone = quote(p.phone);
    let webhook_url = quote(p.webhook_url);

    format!(
        r#"# Telegram API credentials from https://my.telegram.org
TELEGRAM_API_ID={api_id}
TELEGRAM_API_HASH={api_hash}
TELEGRAM_PHONE={phone}

# Discord webhook that receives the relayed messages
DISCORD_WEBHOOK_URL={webhook_url}

# Comma-separated @handles, t.me links, chat ids or exact chat titles
MONITORED_CHANNELS={channels}

{session_line}
# EMBED_COLOR=5814783
"#
    )
}

fn validate_api_id(value: &str) -> Result<()> {
    value
        .parse::<i32>()
        .with_context(|| format!("API ID must be a number, got '{value}'"))?;
    Ok(())
}

// ── CLI ────────────────────────────────────────────────────────────────────────

fn run_cli(project_root: &Path) -> Result<()> {
    println!("=== tgrelay setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let required = |prompt: &str| -> Result<String> {
        loop {
            let value = read_line(prompt)?;
            if !value.is_empty() {
                return Ok(value);
            }
            println!("  A value is required.");
        }
    };

    let api_id = loop {
        let value = required("Telegram API ID: ")?;
        match validate_api_id(&value) {
            Ok(()) => break value,
            Err(e) => println!("  {e}"),
        }
    };
    let api_hash = required("Telegram API hash: ")?;
    let phone = required("Phone number (international format, e.g. +15551234567): ")?;
    let webhook_url = required("Discord webhook URL: ")?;
    let channels = required("Channels to monitor (comma-separated): ")?;
    let session_file = read_line("Session file [telegram_selfbot.session]: ")?;

    let env = format_env(&EnvParams {
        api_id: &api_id,
        api_hash: &api_hash,
        phone: &phone,
        webhook_url: &webhook_url,
        channels: &channels,
        session_file: &session_file,
    });

    let env_path = project_root.join(".env");
    if env_path.exists() {
        let answer = read_line(&format!("{} exists. Overwrite? [y/N]: ", env_path.display()))?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Aborted, nothing written.");
            return Ok(());
        }
    }

    std::fs::write(&env_path, &env)
        .with_context(|| format!("Could not write {}", env_path.display()))?;

    println!("\n✓  .env saved to {}", env_path.display());
    println!("   Run the relay with:  cargo run --bin tgrelay");
    println!("   The first run asks for the login code Telegram sends you.");
    Ok(())
}

fn main() -> Result<()> {
    // Resolve project root: prefer TGRELAY_ROOT env, fall back to cwd.
    let project_root =
        PathBuf::from(std::env::var("TGRELAY_ROOT").unwrap_or_else(|_| ".".to_string()));
    run_cli(&project_root)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
