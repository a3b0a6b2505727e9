//! Turning a [`ContentBundle`] into a publishable media file.
//!
//! # Submodules
//!
//! - [`segment`]: sentence-aware splitting of the narration script
//! - [`ffmpeg`]: slideshow video and image card rendering through `ffmpeg`
//! - [`tts`]: optional narration audio through ElevenLabs
//!
//! Rendering failures are reported to the workflow and never retried.

pub mod ffmpeg;
pub mod segment;
pub mod tts;

use crate::error::RenderError;
use crate::models::{Artifact, ContentBundle, MediaKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Renders a bundle (plus optional narration) into one media file.
pub trait MediaRenderer {
    /// Kind of artifact this renderer produces.
    fn kind(&self) -> MediaKind;

    /// Render into `output`, a path chosen by the caller.
    async fn render(
        &self,
        bundle: &ContentBundle,
        narration: Option<&Artifact>,
        output: &Path,
    ) -> Result<Artifact, RenderError>;
}

/// Synthesises narration audio for a script.
pub trait Narrator {
    async fn narrate(&self, script: &str, output: &Path) -> Result<Artifact, RenderError>;
}

/// Visual settings shared by the renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub font_size: u32,
    pub font_color: String,
    pub background: String,
    pub font_file: Option<PathBuf>,
    /// Longest narration segment shown on one slide.
    pub segment_max_chars: usize,
    /// Characters per wrapped line on a slide.
    pub line_chars: usize,
    /// Slide length when there is no narration to follow.
    pub seconds_per_segment: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 720,
            height: 480,
            fps: 24,
            font_size: 40,
            font_color: "white".to_string(),
            background: "0x1e1e1e".to_string(),
            font_file: None,
            segment_max_chars: 120,
            line_chars: 30,
            seconds_per_segment: Duration::from_secs(8),
        }
    }
}

/// One timed slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub text: String,
    pub duration: Duration,
}

/// Assign durations to segments.
///
/// With narration, time is shared in proportion to segment length and the
/// slides add up exactly to the narration length. Without it every slide
/// gets `per_segment`.
pub fn plan_slides(segments: Vec<String>, narration: Option<Duration>, per_segment: Duration) -> Vec<Slide> {
    let Some(total) = narration else {
        return segments
            .into_iter()
            .map(|text| Slide {
                text,
                duration: per_segment,
            })
            .collect();
    };

    let weights: Vec<u128> = segments.iter().map(|s| s.chars().count().max(1) as u128).collect();
    let weight_sum: u128 = weights.iter().sum();
    let total_ms = total.as_millis();
    let mut assigned = 0u128;
    let last = segments.len().saturating_sub(1);

    segments
        .into_iter()
        .zip(weights)
        .enumerate()
        .map(|(i, (text, weight))| {
            let ms = if i == last {
                total_ms - assigned
            } else {
                total_ms * weight / weight_sum
            };
            assigned += ms;
            Slide {
                text,
                duration: Duration::from_millis(ms as u64),
            }
        })
        .collect()
}

/// Total length of a slide plan.
pub fn plan_duration(slides: &[Slide]) -> Duration {
    slides.iter().map(|s| s.duration).sum()
}
