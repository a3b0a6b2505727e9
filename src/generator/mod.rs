//! Content generation: articles in, one [`ContentBundle`] out.
//!
//! The generator asks the text backend for a structured bundle built from
//! the top articles. Transient backend failures are retried by
//! [`RetryBackend`]; anything the retries cannot fix, and any unusable model
//! output, falls back to a bundle assembled from the article titles alone.
//! [`ContentGenerator::generate`] therefore always returns a complete bundle.

pub mod gemini;
pub mod retry;

use crate::error::BackendError;
use crate::models::{Article, ContentBundle};
use crate::sources::trending_topics;
use crate::utils::{truncate_chars, truncate_for_log, truncate_utf16};
use retry::{RetryBackend, RetryPolicy, TextBackend};
use serde::Deserialize;
use std::fmt::Write;
use tracing::{error, info, instrument, warn};

/// Articles included in a prompt.
pub const PROMPT_ARTICLES: usize = 3;

const FALLBACK_HASHTAGS: [&str; 3] = ["#AI", "#TechNews", "#Innovation"];

/// Bounds applied to prompts and generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSettings {
    /// Summary characters per article in the prompt.
    pub prompt_summary_chars: usize,
    /// Hard cap on the caption, hashtags included.
    pub caption_max_chars: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            prompt_summary_chars: 200,
            caption_max_chars: 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBundle {
    headline: String,
    bullets: Vec<String>,
    script: String,
    caption: String,
    #[serde(default)]
    hashtags: Vec<String>,
}

/// Turns articles into a [`ContentBundle`], never failing.
pub struct ContentGenerator<B> {
    backend: RetryBackend<B>,
    settings: GeneratorSettings,
}

impl<B: TextBackend> ContentGenerator<B> {
    pub fn new(backend: B, policy: RetryPolicy, settings: GeneratorSettings) -> Self {
        Self {
            backend: RetryBackend::new(backend, policy),
            settings,
        }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        self.backend.inner()
    }

    /// Produce the bundle for this run.
    ///
    /// Callers must not pass an empty slice; the workflow skips the run
    /// before getting here. An empty slice still yields a fallback bundle.
    #[instrument(level = "info", skip_all, fields(articles = articles.len()))]
    pub async fn generate(&self, articles: &[Article]) -> ContentBundle {
        let topics = trending_topics(articles, 5);
        info!(?topics, "Trending topics");
        let prompt = build_prompt(articles, &topics, self.settings.prompt_summary_chars);

        let failure = match self.backend.generate(&prompt).await {
            Ok(text) => match parse_bundle(&text, self.settings.caption_max_chars) {
                Ok(bundle) => {
                    info!(headline = %bundle.headline, bullets = bundle.bullets.len(), "Generated content bundle");
                    return bundle;
                }
                Err(reason) => {
                    error!(
                        %reason,
                        response_preview = %truncate_for_log(&text, 300),
                        "Backend returned unusable content; using fallback"
                    );
                    return fallback_bundle(articles, self.settings.caption_max_chars);
                }
            },
            Err(e) => e,
        };

        match &failure {
            BackendError::Overloaded(_) => {
                warn!(error = %failure, "Backend still overloaded after retries; using fallback")
            }
            BackendError::Permanent(_) => {
                error!(error = %failure, "Backend failed permanently; using fallback")
            }
        }
        fallback_bundle(articles, self.settings.caption_max_chars)
    }
}

/// Prompt built from at most [`PROMPT_ARTICLES`] articles.
pub fn build_prompt(articles: &[Article], topics: &[String], summary_chars: usize) -> String {
    let mut news = String::new();
    for (i, article) in articles.iter().take(PROMPT_ARTICLES).enumerate() {
        let _ = writeln!(
            news,
            "{}. {}\n   Source: {}\n   Summary: {}\n",
            i + 1,
            article.title,
            article.source,
            truncate_chars(&article.summary, summary_chars)
        );
    }
    let topics = if topics.is_empty() {
        "none".to_string()
    } else {
        topics.join(", ")
    };

    format!(
        "You write a short daily AI news video for a Telegram channel.\n\
         Based on these latest AI news articles:\n\n\
         {news}\
         Trending topics: {topics}\n\n\
         Return JSON with:\n\
         - headline: one line, under 80 characters\n\
         - bullets: 3 to 5 key points, each under 20 words\n\
         - script: a narration of 4 to 8 full sentences covering the key points\n\
         - caption: a short engaging message for the post, without hashtags\n\
         - hashtags: 3 to 5 hashtags such as #AI or #TechNews\n\
         Use only facts from the articles."
    )
}

/// Parse and validate model output.
///
/// Tolerates prose or code fences around the JSON object.
pub fn parse_bundle(text: &str, caption_max_chars: usize) -> Result<ContentBundle, String> {
    let start = text.find('{').ok_or("no JSON object in response")?;
    let end = text.rfind('}').ok_or("no JSON object in response")?;
    if end < start {
        return Err("no JSON object in response".to_string());
    }
    let raw: RawBundle = serde_json::from_str(&text[start..=end]).map_err(|e| e.to_string())?;

    let hashtags = normalize_hashtags(&raw.hashtags);
    let bundle = ContentBundle {
        headline: raw.headline.trim().to_string(),
        bullets: raw
            .bullets
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect(),
        script: raw.script.trim().to_string(),
        caption: compose_caption(raw.caption.trim(), &hashtags, caption_max_chars),
        hashtags,
    };

    if bundle.is_complete() {
        Ok(bundle)
    } else {
        Err("structured output is missing required fields".to_string())
    }
}

/// Deterministic bundle built from article titles only.
pub fn fallback_bundle(articles: &[Article], caption_max_chars: usize) -> ContentBundle {
    let mut titles: Vec<String> = articles
        .iter()
        .take(PROMPT_ARTICLES)
        .map(|a| a.title.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if titles.is_empty() {
        titles.push("No major AI headlines today".to_string());
    }

    let headline = truncate_chars(&format!("AI News: {}", titles[0]), 120);
    let script = std::iter::once("Here are today's top AI stories.".to_string())
        .chain(titles.iter().map(|t| as_sentence(t)))
        .collect::<Vec<_>>()
        .join(" ");
    let mut caption = String::from("Today's AI headlines:");
    for title in &titles {
        let _ = write!(caption, "\n• {title}");
    }
    let hashtags: Vec<String> = FALLBACK_HASHTAGS.iter().map(|t| t.to_string()).collect();

    ContentBundle {
        headline,
        caption: compose_caption(&caption, &hashtags, caption_max_chars),
        bullets: titles,
        script,
        hashtags,
    }
}

fn as_sentence(title: &str) -> String {
    if title.ends_with(['.', '!', '?']) {
        title.to_string()
    } else {
        format!("{title}.")
    }
}

fn normalize_hashtags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().trim_start_matches('#').replace(char::is_whitespace, ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("#{t}"))
        .collect()
}

/// Caption text plus hashtags, capped at `max` UTF-16 code units.
///
/// The text is shortened first so the tags survive whenever they fit.
pub fn compose_caption(text: &str, hashtags: &[String], max: usize) -> String {
    if hashtags.is_empty() {
        return truncate_utf16(text, max);
    }
    let tags = hashtags.join(" ");
    let tag_len = tags.encode_utf16().count() + 2;
    if tag_len >= max {
        return truncate_utf16(text, max);
    }
    format!("{}\n\n{}", truncate_utf16(text, max - tag_len), tags)
}
