use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Discord caps embed titles at 256 characters
pub const EMBED_TITLE_LIMIT: usize = 256;
/// Discord caps embed descriptions at 4096 characters
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;
/// Discord caps embed footer text at 2048 characters
pub const EMBED_FOOTER_LIMIT: usize = 2048;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// RFC 3339 timestamp shown in the embed footer
    pub timestamp: String,
    pub color: u32,
    pub footer: EmbedFooter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

/// Body of an execute-webhook request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

/// A file uploaded alongside the payload
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            filename: "image.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes,
        }
    }

    /// URL an embed uses to reference this upload
    pub fn embed_url(&self) -> String {
        format!("attachment://{}", self.filename)
    }
}

/// Destination for relayed messages
#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// Perform one delivery attempt. Errors are final; callers never retry.
    async fn deliver(&self, payload: &WebhookPayload, attachment: Option<&Attachment>)
        -> Result<()>;
}

/// Client for a single Discord webhook URL
pub struct DiscordWebhook {
    client: reqwest::Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn multipart_form(payload: &WebhookPayload, attachment: &Attachment) -> Result<Form> {
        let payload_json =
            serde_json::to_string(payload).context("Failed to serialize webhook payload")?;
        let file = Part::bytes(attachment.bytes.clone())
            .file_name(attachment.filename.clone())
            .mime_str(&attachment.content_type)
            .context("Invalid attachment content type")?;
        Ok(Form::new()
            .part("files[0]", file)
            .text("payload_json", payload_json))
    }
}

#[async_trait]
impl WebhookSink for DiscordWebhook {
    async fn deliver(
        &self,
        payload: &WebhookPayload,
        attachment: Option<&Attachment>,
    ) -> Result<()> {
        let request = self.client.post(&self.url);
        let request = match attachment {
            Some(attachment) => {
                debug!(
                    "Sending webhook with attachment {} ({} bytes)",
                    attachment.filename,
                    attachment.bytes.len()
                );
                request.multipart(Self::multipart_form(payload, attachment)?)
            }
            None => {
                debug!("Sending webhook with {} embed(s)", payload.embeds.len());
                request.json(payload)
            }
        };

        let response = request
            .send()
            .await
            .context("Failed to send request to Discord webhook")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook error ({}): {}", status, error_body);
        }

        Ok(())
    }
}
