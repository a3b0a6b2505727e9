//! Data models that flow through the daily pipeline.
//!
//! This module defines the values handed from one stage to the next:
//! - [`Article`]: one fetched news item, keyed by its canonical link
//! - [`ContentBundle`]: the generated text package for one run
//! - [`Artifact`]: a media file on disk, ready to publish
//! - [`WorkflowRun`]: the ephemeral record of one scheduled execution
//!
//! Everything except [`WorkflowRun`] is immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A news item as returned by a feed.
///
/// The `link` is the unique key used for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Name of the feed the item came from (e.g. `techcrunch_ai`).
    pub source: String,
    /// Headline with markup stripped.
    pub title: String,
    /// Plain-text summary, already capped in length.
    pub summary: String,
    /// Canonical URL of the story.
    pub link: String,
    /// Publication time, normalised to UTC.
    pub published: DateTime<Utc>,
}

/// Generated text package for one run.
///
/// Produced once per run by the content generator, either from the model
/// output or from the deterministic title-only fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBundle {
    /// One-line headline shown on the first slide and image card.
    pub headline: String,
    /// Key points, in display order.
    pub bullets: Vec<String>,
    /// Text read out by the narrator and split into slides.
    pub script: String,
    /// Message text sent alongside the artifact.
    pub caption: String,
    /// Tags appended to the caption (`#AI`, `#TechNews`, ...).
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl ContentBundle {
    /// True when every field a renderer or publisher relies on is populated.
    pub fn is_complete(&self) -> bool {
        !self.headline.trim().is_empty()
            && !self.script.trim().is_empty()
            && !self.caption.trim().is_empty()
            && !self.bullets.is_empty()
            && self.bullets.iter().all(|b| !b.trim().is_empty())
    }
}

/// The kind of media an [`Artifact`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        };
        f.write_str(name)
    }
}

/// A rendered media file.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Playback length for time-based media.
    pub duration: Option<Duration>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind, duration: Option<Duration>) -> Self {
        Self {
            path: path.into(),
            kind,
            duration,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for uploads, falling back to a name derived from the kind.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("artifact.{}", self.kind.extension()))
    }
}

/// Pipeline position of a run. Runs only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Fetching,
    Generating,
    Rendering,
    Publishing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Generating => "generating",
            Stage::Rendering => "rendering",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a finished run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Success => "success",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Record of one scheduled execution. Never persisted.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    /// Unique per run; also used to name transient files.
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub stage: Stage,
    pub outcome: Option<Outcome>,
    /// Stage at which a skip or failure happened.
    pub failed_stage: Option<Stage>,
    pub reason: Option<String>,
}

impl WorkflowRun {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            stage: Stage::Idle,
            outcome: None,
            failed_stage: None,
            reason: None,
        }
    }

    /// Move to the next stage.
    ///
    /// Stages are strictly increasing; re-entering or going back is a bug in
    /// the caller and is ignored (with an error log) in release builds.
    pub fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stage {} after {}", next, self.stage);
        if next <= self.stage {
            tracing::error!(run_id = %self.run_id, from = %self.stage, to = %next, "Refusing backward stage transition");
            return;
        }
        tracing::info!(run_id = %self.run_id, from = %self.stage, stage = %next, "Stage transition");
        self.stage = next;
    }

    /// Close the run with `outcome`. Idempotent: the first call wins.
    pub fn finish(&mut self, outcome: Outcome, reason: Option<String>) {
        if self.outcome.is_some() {
            return;
        }
        if outcome != Outcome::Success {
            self.failed_stage = Some(self.stage);
        }
        self.stage = Stage::Done;
        self.outcome = Some(outcome);
        self.reason = reason;
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> ContentBundle {
        ContentBundle {
            headline: "AI this week".to_string(),
            bullets: vec!["Models got bigger".to_string()],
            script: "Models got bigger.".to_string(),
            caption: "AI this week".to_string(),
            hashtags: vec!["#AI".to_string()],
        }
    }

    #[test]
    fn test_complete_bundle() {
        assert!(bundle().is_complete());
    }

    #[test]
    fn test_bundle_with_blank_bullet_is_incomplete() {
        let mut b = bundle();
        b.bullets.push("   ".to_string());
        assert!(!b.is_complete());
    }

    #[test]
    fn test_bundle_deserializes_without_hashtags() {
        let json = r#"{"headline":"h","bullets":["b"],"script":"s","caption":"c"}"#;
        let b: ContentBundle = serde_json::from_str(json).unwrap();
        assert!(b.hashtags.is_empty());
        assert!(b.is_complete());
    }

    #[test]
    fn test_article_json_keeps_utc_timestamp() {
        use chrono::TimeZone;
        let article = Article {
            source: "verge".to_string(),
            title: "Chips".to_string(),
            summary: "New accelerators ship.".to_string(),
            link: "https://example.com/chips".to_string(),
            published: Utc.with_ymd_and_hms(2025, 5, 6, 9, 30, 0).unwrap(),
        };
        let json = serde_json::to_string(&article).unwrap();
        assert!(json.contains("\"published\":\"2025-05-06T09:30:00Z\""), "{json}");
        let back: Article = serde_json::from_str(&json).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_artifact_file_name() {
        let a = Artifact::new("/tmp/work/ai_news_1.mp4", MediaKind::Video, None);
        assert_eq!(a.file_name(), "ai_news_1.mp4");
        let b = Artifact::new("/", MediaKind::Image, None);
        assert_eq!(b.file_name(), "artifact.png");
    }

    #[test]
    fn test_run_moves_forward_and_finishes() {
        let mut run = WorkflowRun::new("r1");
        run.advance(Stage::Fetching);
        run.advance(Stage::Generating);
        run.finish(Outcome::Failed, Some("boom".to_string()));
        assert!(run.is_done());
        assert_eq!(run.outcome, Some(Outcome::Failed));
        assert_eq!(run.failed_stage, Some(Stage::Generating));

        // First outcome wins.
        run.finish(Outcome::Success, None);
        assert_eq!(run.outcome, Some(Outcome::Failed));
    }

    #[test]
    fn test_success_has_no_failed_stage() {
        let mut run = WorkflowRun::new("r2");
        run.advance(Stage::Fetching);
        run.advance(Stage::Publishing);
        run.finish(Outcome::Success, None);
        assert_eq!(run.failed_stage, None);
    }
}
