//! Publishing rendered artifacts to a Telegram chat.
//!
//! The Bot API method is picked from the artifact kind:
//!
//! | Kind | Method | File field |
//! |------|--------|------------|
//! | video | `sendVideo` | `video` |
//! | image | `sendPhoto` | `photo` |
//! | audio | `sendAudio` | `audio` |
//!
//! Uploads are sent once. A non-`ok` answer is a [`PublishError::Rejected`].

use crate::error::PublishError;
use crate::models::{Artifact, MediaKind};
use crate::utils::{truncate_for_log, truncate_utf16};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::fs;
use tracing::{info, instrument};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram's limit on media captions, in UTF-16 code units.
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;

/// Proof of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: i64,
}

/// Delivers one artifact with its caption.
pub trait Publisher {
    async fn publish(&self, artifact: &Artifact, caption: &str) -> Result<PublishReceipt, PublishError>;
}

#[derive(Deserialize, Debug)]
struct BotResponse {
    ok: bool,
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SentMessage {
    message_id: i64,
}

fn method_for(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Video => ("sendVideo", "video"),
        MediaKind::Image => ("sendPhoto", "photo"),
        MediaKind::Audio => ("sendAudio", "audio"),
    }
}

#[derive(Debug, Clone)]
pub struct TelegramPublisher {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    caption_limit: usize,
}

impl TelegramPublisher {
    pub fn new(client: Client, api_base: String, token: String, chat_id: String, caption_limit: usize) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            chat_id,
            caption_limit: caption_limit.min(TELEGRAM_CAPTION_LIMIT),
        }
    }
}

impl Publisher for TelegramPublisher {
    #[instrument(level = "info", skip_all, fields(kind = %artifact.kind, file = %artifact.file_name()))]
    async fn publish(&self, artifact: &Artifact, caption: &str) -> Result<PublishReceipt, PublishError> {
        let bytes = fs::read(artifact.path())
            .await
            .map_err(|source| PublishError::Artifact {
                path: artifact.path.clone(),
                source,
            })?;
        let size = bytes.len();
        let (method, field) = method_for(artifact.kind);

        let file = Part::bytes(bytes)
            .file_name(artifact.file_name())
            .mime_str(artifact.kind.mime_type())?;
        let mut form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", truncate_utf16(caption, self.caption_limit))
            .part(field, file);
        if let (MediaKind::Video, Some(d)) = (artifact.kind, artifact.duration) {
            form = form
                .text("duration", d.as_secs().to_string())
                .text("supports_streaming", "true");
        }

        // The token is part of the path; never log the URL.
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let parsed: Option<BotResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(BotResponse {
                ok: true,
                result: Some(message),
                ..
            }) => {
                info!(%method, bytes = size, message_id = message.message_id, "Published");
                Ok(PublishReceipt {
                    message_id: message.message_id,
                })
            }
            Some(reply) => Err(PublishError::Rejected {
                status,
                description: reply.description.unwrap_or_else(|| "no description".to_string()),
            }),
            None => Err(PublishError::Rejected {
                status,
                description: truncate_for_log(&body, 200),
            }),
        }
    }
}
