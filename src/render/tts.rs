//! ElevenLabs text-to-speech narration.
//!
//! The audio is written next to the video it belongs to and its length is
//! read back with `ffprobe` so slides can be timed against it.

use crate::error::RenderError;
use crate::models::{Artifact, MediaKind};
use crate::render::Narrator;
use crate::render::ffmpeg::probe_duration;
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct ElevenLabsNarrator {
    client: Client,
    api_key: String,
    voice_id: String,
    base_url: String,
    ffprobe: PathBuf,
}

impl ElevenLabsNarrator {
    pub fn new(client: Client, api_key: String, voice_id: String, base_url: String, ffprobe: PathBuf) -> Self {
        Self {
            client,
            api_key,
            voice_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            ffprobe,
        }
    }

    /// Request the speech and write the MP3 bytes to `output`.
    async fn synthesize(&self, script: &str, output: &Path) -> Result<u64, RenderError> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .header("accept", MediaKind::Audio.mime_type())
            .json(&SpeechRequest {
                text: script,
                model_id: DEFAULT_MODEL_ID,
            })
            .send()
            .await
            .map_err(|e| RenderError::Speech(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::Speech(format!(
                "{}: {}",
                status.as_u16(),
                truncate_for_log(&body, 200)
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Speech(e.to_string()))?;
        if bytes.is_empty() {
            return Err(RenderError::Speech("empty audio response".to_string()));
        }
        fs::write(output, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

impl Narrator for ElevenLabsNarrator {
    #[instrument(level = "info", skip_all, fields(voice = %self.voice_id, output = %output.display()))]
    async fn narrate(&self, script: &str, output: &Path) -> Result<Artifact, RenderError> {
        if script.trim().is_empty() {
            return Err(RenderError::Empty("narration script has no text"));
        }
        let result = async {
            let bytes = self.synthesize(script, output).await?;
            let duration = probe_duration(&self.ffprobe, output).await?;
            info!(bytes, duration_secs = duration.as_secs_f64(), "Narration ready");
            Ok::<_, RenderError>(Artifact::new(output, MediaKind::Audio, Some(duration)))
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(output).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn narrator(url: String, ffprobe: PathBuf) -> ElevenLabsNarrator {
        ElevenLabsNarrator::new(Client::new(), "xi".to_string(), "voice1".to_string(), url, ffprobe)
    }

    #[tokio::test]
    async fn test_rejected_request_is_speech_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/text-to-speech/voice1")
            .match_header("xi-api-key", "xi")
            .match_body(Matcher::PartialJson(json!({ "text": "Hello there." })))
            .with_status(401)
            .with_body(r#"{"detail":{"status":"invalid_api_key"}}"#)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("voice.mp3");
        let err = narrator(server.url(), PathBuf::from("ffprobe"))
            .narrate("Hello there.", &out)
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Speech(ref m) if m.starts_with("401")), "{err:?}");
        assert!(!out.exists());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_probe_failure_removes_audio() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/text-to-speech/voice1")
            .with_status(200)
            .with_body(vec![0u8; 64])
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("voice.mp3");
        let err = narrator(server.url(), tmp.path().join("missing-ffprobe"))
            .narrate("Hello there.", &out)
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Io(_)), "{err:?}");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_blank_script_is_rejected_without_request() {
        let tmp = tempfile::tempdir().unwrap();
        let err = narrator("http://127.0.0.1:9".to_string(), PathBuf::from("ffprobe"))
            .narrate("   ", &tmp.path().join("voice.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Empty(_)));
    }
}
