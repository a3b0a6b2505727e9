//! Slideshow and image rendering with the `ffmpeg` command-line tools.
//!
//! A video is built as one short clip per narration segment (solid
//! background, centred text), concatenated with the concat demuxer and muxed
//! with the narration track when there is one. An image card is a single
//! frame with the headline and bullets.
//!
//! Intermediate files live next to the output and are removed whether or not
//! rendering succeeds.

use crate::error::RenderError;
use crate::models::{Artifact, ContentBundle, MediaKind};
use crate::render::segment::{split_script, wrap_words};
use crate::render::{MediaRenderer, RenderSettings, Slide, plan_duration, plan_slides};
use crate::utils::truncate_for_log;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Run an external tool, mapping a non-zero exit to [`RenderError::Tool`].
async fn run_tool(tool: &'static str, bin: &Path, args: &[String]) -> Result<Vec<u8>, RenderError> {
    debug!(%tool, ?args, "Running");
    let output = Command::new(bin).args(args).output().await?;
    if !output.status.success() {
        return Err(RenderError::Tool {
            tool,
            status: output.status.to_string(),
            stderr: truncate_for_log(String::from_utf8_lossy(&output.stderr).trim(), 500),
        });
    }
    Ok(output.stdout)
}

/// Length of a media file as reported by `ffprobe`.
pub async fn probe_duration(ffprobe: &Path, media: &Path) -> Result<Duration, RenderError> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        media.display().to_string(),
    ];
    let stdout = run_tool("ffprobe", ffprobe, &args).await?;
    parse_probe_output(&String::from_utf8_lossy(&stdout))
}

fn parse_probe_output(stdout: &str) -> Result<Duration, RenderError> {
    let raw = stdout.trim();
    let secs: f64 = raw
        .parse()
        .map_err(|_| RenderError::Probe(format!("unexpected ffprobe output {raw:?}")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(RenderError::Probe(format!("non-positive duration {secs}")));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Escape a value for use inside an ffmpeg filter option.
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
        .replace(',', "\\,")
}

/// Quote a path for a concat demuxer list line.
fn concat_line(path: &Path) -> String {
    format!("file '{}'", path.display().to_string().replace('\'', "'\\''"))
}

fn secs(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// Renders through `ffmpeg`/`ffprobe` binaries found on `PATH` or configured.
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    settings: RenderSettings,
    kind: MediaKind,
    ffmpeg: PathBuf,
}

impl FfmpegRenderer {
    /// `kind` must be [`MediaKind::Video`] or [`MediaKind::Image`].
    pub fn new(settings: RenderSettings, kind: MediaKind, ffmpeg: PathBuf) -> Self {
        Self {
            settings,
            kind,
            ffmpeg,
        }
    }

    fn drawtext(&self, text_file: &Path) -> String {
        let s = &self.settings;
        let mut filter = format!(
            "drawtext=textfile='{}':expansion=none:fontcolor={}:fontsize={}:line_spacing=12:x=(w-text_w)/2:y=(h-text_h)/2",
            escape_filter_value(&text_file.display().to_string()),
            s.font_color,
            s.font_size,
        );
        if let Some(font) = &s.font_file {
            filter.push_str(&format!(":fontfile='{}'", escape_filter_value(&font.display().to_string())));
        }
        filter
    }

    fn background(&self, duration: Option<Duration>) -> String {
        let s = &self.settings;
        let mut source = format!("color=c={}:s={}x{}:r={}", s.background, s.width, s.height, s.fps);
        if let Some(d) = duration {
            source.push_str(&format!(":d={}", secs(d)));
        }
        source
    }

    pub(crate) fn segment_args(&self, text_file: &Path, duration: Duration, out: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.background(Some(duration)));
        args.extend(["-vf".to_string(), self.drawtext(text_file)]);
        args.extend(
            ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-r"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(self.settings.fps.to_string());
        args.push(out.display().to_string());
        args
    }

    pub(crate) fn concat_args(&self, list: &Path, audio: Option<&Path>, total: Duration, out: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(list.display().to_string());
        if let Some(audio) = audio {
            args.extend(["-i".to_string(), audio.display().to_string()]);
            args.extend(
                ["-map", "0:v:0", "-map", "1:a:0", "-c:a", "aac"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }
        args.extend(["-c:v", "copy", "-t"].iter().map(|s| s.to_string()));
        args.push(secs(total));
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args.push(out.display().to_string());
        args
    }

    pub(crate) fn image_args(&self, text_file: &Path, out: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.push(self.background(None));
        args.extend(["-vf".to_string(), self.drawtext(text_file)]);
        args.extend(["-frames:v".to_string(), "1".to_string()]);
        args.push(out.display().to_string());
        args
    }

    /// Text shown on the image card.
    pub(crate) fn card_text(&self, bundle: &ContentBundle) -> String {
        let width = self.settings.line_chars;
        let mut lines = wrap_words(&bundle.headline, width);
        lines.push(String::new());
        for bullet in &bundle.bullets {
            for (i, line) in wrap_words(bullet, width.saturating_sub(2).max(1)).into_iter().enumerate() {
                lines.push(if i == 0 { format!("• {line}") } else { format!("  {line}") });
            }
        }
        lines.join("\n")
    }

    async fn render_video(
        &self,
        bundle: &ContentBundle,
        narration: Option<&Artifact>,
        output: &Path,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<Artifact, RenderError> {
        let segments = split_script(&bundle.script, self.settings.segment_max_chars);
        if segments.is_empty() {
            return Err(RenderError::Empty("narration script has no text"));
        }
        let narration_length = narration.and_then(|a| a.duration);
        let slides: Vec<Slide> = plan_slides(segments, narration_length, self.settings.seconds_per_segment);
        let total = plan_duration(&slides);
        info!(slides = slides.len(), total_secs = total.as_secs_f64(), narrated = narration_length.is_some(), "Rendering slideshow");

        let mut list = String::new();
        for (i, slide) in slides.iter().enumerate() {
            let text_file = scratch_path(output, &format!("seg{i}.txt"));
            let clip = scratch_path(output, &format!("seg{i}.mp4"));
            scratch.push(text_file.clone());
            scratch.push(clip.clone());

            fs::write(&text_file, wrap_words(&slide.text, self.settings.line_chars).join("\n")).await?;
            run_tool("ffmpeg", &self.ffmpeg, &self.segment_args(&text_file, slide.duration, &clip)).await?;
            list.push_str(&concat_line(&clip));
            list.push('\n');
        }

        let list_file = scratch_path(output, "concat.txt");
        scratch.push(list_file.clone());
        fs::write(&list_file, list).await?;

        let audio = narration.map(Artifact::path);
        run_tool("ffmpeg", &self.ffmpeg, &self.concat_args(&list_file, audio, total, output)).await?;
        Ok(Artifact::new(output, MediaKind::Video, Some(total)))
    }

    async fn render_image(
        &self,
        bundle: &ContentBundle,
        output: &Path,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<Artifact, RenderError> {
        let text_file = scratch_path(output, "card.txt");
        scratch.push(text_file.clone());
        fs::write(&text_file, self.card_text(bundle)).await?;
        run_tool("ffmpeg", &self.ffmpeg, &self.image_args(&text_file, output)).await?;
        Ok(Artifact::new(output, MediaKind::Image, None))
    }
}

/// Sibling path for an intermediate file: `<stem>.<suffix>` next to `output`.
fn scratch_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("render");
    output.with_file_name(format!("{stem}.{suffix}"))
}

impl MediaRenderer for FfmpegRenderer {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    #[instrument(level = "info", skip_all, fields(kind = %self.kind, output = %output.display()))]
    async fn render(
        &self,
        bundle: &ContentBundle,
        narration: Option<&Artifact>,
        output: &Path,
    ) -> Result<Artifact, RenderError> {
        let mut scratch = Vec::new();
        let result = match self.kind {
            MediaKind::Image => self.render_image(bundle, output, &mut scratch).await,
            _ => self.render_video(bundle, narration, output, &mut scratch).await,
        };

        for path in scratch {
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Could not remove intermediate file");
                }
            }
        }
        if result.is_err() {
            let _ = fs::remove_file(output).await;
        }
        result
    }
}
