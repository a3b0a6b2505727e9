//! Gemini `generateContent` client with structured JSON output.
//!
//! Requests ask for `application/json` constrained by a response schema that
//! mirrors [`ContentBundle`](crate::models::ContentBundle). Failures are
//! classified for the retry layer:
//!
//! | Condition | Class |
//! |-----------|-------|
//! | HTTP 503 / 429, `UNAVAILABLE`, `RESOURCE_EXHAUSTED`, "overloaded" | transient |
//! | timeout or connection error | transient |
//! | anything else (401, 400, empty candidates, ...) | permanent |

use crate::error::BackendError;
use crate::generator::retry::TextBackend;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: Value,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Schema for the structured bundle the model must return.
pub fn bundle_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "headline": { "type": "STRING" },
            "bullets": { "type": "ARRAY", "items": { "type": "STRING" } },
            "script": { "type": "STRING" },
            "caption": { "type": "STRING" },
            "hashtags": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["headline", "bullets", "script", "caption"]
    })
}

/// HTTP client for one Gemini model.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Map a non-success HTTP answer to an error class.
fn classify(status: StatusCode, body: &str) -> BackendError {
    let (api_status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.status, envelope.error.message),
        Err(_) => (String::new(), truncate_for_log(body, 200)),
    };
    let detail = format!("{} {}: {}", status.as_u16(), api_status, message);

    let transient = matches!(status, StatusCode::SERVICE_UNAVAILABLE | StatusCode::TOO_MANY_REQUESTS)
        || matches!(api_status.as_str(), "UNAVAILABLE" | "RESOURCE_EXHAUSTED")
        || message.to_lowercase().contains("overloaded");
    if transient {
        BackendError::Overloaded(detail)
    } else {
        BackendError::Permanent(detail)
    }
}

impl TextBackend for GeminiBackend {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let t0 = Instant::now();
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: json!({
                "responseMimeType": "application/json",
                "responseSchema": bundle_schema(),
            }),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    BackendError::Overloaded(e.to_string())
                } else {
                    BackendError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Overloaded(format!("reading body: {e}")))?;
        let elapsed_ms = t0.elapsed().as_millis();

        if !status.is_success() {
            let err = classify(status, &body);
            warn!(elapsed_ms, error = %err, "Gemini call failed");
            return Err(err);
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            BackendError::Permanent(format!("unexpected response shape: {e}: {}", truncate_for_log(&body, 200)))
        })?;
        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<String>();

        if text.trim().is_empty() {
            return Err(BackendError::Permanent("response had no text candidates".to_string()));
        }
        debug!(elapsed_ms, bytes = text.len(), "Gemini call succeeded");
        Ok(text)
    }
}
