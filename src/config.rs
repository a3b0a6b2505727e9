//! Validated runtime configuration.
//!
//! [`Config::from_cli`] is the single place where settings are checked. It
//! runs before anything is scheduled, and any problem it finds stops the
//! process with a non-zero exit.

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::generator::GeneratorSettings;
use crate::generator::retry::RetryPolicy;
use crate::models::MediaKind;
use crate::publish::TELEGRAM_CAPTION_LIMIT;
use crate::render::RenderSettings;
use crate::scheduler::{Clock, parse_time};
use crate::sources::{FeedDescriptor, default_feeds};
use crate::workflow::WorkflowSettings;
use chrono::NaiveTime;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct NarrationConfig {
    pub api_key: String,
    pub voice_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub telegram: TelegramConfig,
    /// Present only when an ElevenLabs key is configured.
    pub narration: Option<NarrationConfig>,
    pub feeds: Vec<FeedDescriptor>,
    pub feed_summary_chars: usize,
    pub media: MediaKind,
    pub render: RenderSettings,
    pub generator: GeneratorSettings,
    pub retry: RetryPolicy,
    pub workflow: WorkflowSettings,
    pub schedule: Vec<NaiveTime>,
    pub clock: Clock,
    pub poll: Duration,
    pub run_now: bool,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub http_timeout: Duration,
}

const MAX_RECENCY_HOURS: i64 = 24 * 365;

/// A non-blank value or [`ConfigError::Missing`].
fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn positive<T: PartialOrd + Default + Copy>(value: T, field: &'static str) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        })
    }
}

/// Load feed descriptors from a YAML list.
pub fn load_feeds(path: &Path) -> Result<Vec<FeedDescriptor>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::FeedsFile {
        path: path.to_path_buf(),
        source,
    })?;
    let feeds: Vec<FeedDescriptor> = serde_yaml::from_str(&raw).map_err(|source| ConfigError::FeedsFormat {
        path: path.to_path_buf(),
        source,
    })?;
    if feeds.is_empty() {
        return Err(ConfigError::Invalid {
            field: "feeds",
            reason: format!("{} lists no feeds", path.display()),
        });
    }
    Ok(feeds)
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let gemini = GeminiConfig {
            api_key: required(cli.gemini_api_key, "GEMINI_API_KEY")?,
            model: cli.gemini_model,
            base_url: cli.gemini_base_url,
        };
        let telegram = TelegramConfig {
            bot_token: required(cli.telegram_bot_token, "TELEGRAM_BOT_TOKEN")?,
            chat_id: required(cli.telegram_chat_id, "TELEGRAM_CHAT_ID")?,
            api_base: cli.telegram_api_base,
        };
        let narration = cli
            .elevenlabs_api_key
            .filter(|k| !k.trim().is_empty())
            .map(|api_key| NarrationConfig {
                api_key,
                voice_id: cli.elevenlabs_voice_id,
                base_url: cli.elevenlabs_base_url,
            });

        let schedule = cli
            .at
            .iter()
            .map(|t| parse_time(t))
            .collect::<Result<Vec<_>, _>>()?;
        if schedule.is_empty() {
            return Err(ConfigError::Invalid {
                field: "at",
                reason: "at least one time of day is required".to_string(),
            });
        }

        let feeds = match &cli.feeds {
            Some(path) => load_feeds(path)?,
            None => default_feeds(),
        };

        let caption_max_chars = positive(cli.caption_max_chars, "caption-max-chars")?;
        if caption_max_chars > TELEGRAM_CAPTION_LIMIT {
            return Err(ConfigError::Invalid {
                field: "caption-max-chars",
                reason: format!("Telegram captions are limited to {TELEGRAM_CAPTION_LIMIT} characters"),
            });
        }

        let recency_hours = positive(cli.recency_hours, "recency-hours")?;
        if recency_hours > MAX_RECENCY_HOURS {
            return Err(ConfigError::Invalid {
                field: "recency-hours",
                reason: format!("must be at most {MAX_RECENCY_HOURS} (one year)"),
            });
        }

        let render = RenderSettings {
            font_file: cli.font_file,
            segment_max_chars: positive(cli.segment_max_chars, "segment-max-chars")?,
            seconds_per_segment: Duration::from_secs(positive(cli.seconds_per_segment, "seconds-per-segment")?),
            ..RenderSettings::default()
        };
        if let Some(font) = &render.font_file {
            if !font.is_file() {
                return Err(ConfigError::Invalid {
                    field: "font-file",
                    reason: format!("{} does not exist", font.display()),
                });
            }
        }

        Ok(Self {
            gemini,
            telegram,
            narration,
            feeds,
            feed_summary_chars: positive(cli.feed_summary_chars, "feed-summary-chars")?,
            media: cli.media.into(),
            render,
            generator: GeneratorSettings {
                prompt_summary_chars: positive(cli.prompt_summary_chars, "prompt-summary-chars")?,
                caption_max_chars,
            },
            retry: RetryPolicy {
                max_retries: cli.max_retries,
                base_delay: Duration::from_secs(cli.retry_base_secs),
            },
            workflow: WorkflowSettings {
                work_dir: cli.work_dir,
                max_articles: positive(cli.max_articles, "max-articles")?,
                recency_window: chrono::Duration::hours(recency_hours),
            },
            schedule,
            clock: if cli.utc { Clock::Utc } else { Clock::Local },
            poll: Duration::from_secs(positive(cli.poll_secs, "poll-secs")?),
            run_now: cli.run_now,
            ffmpeg_bin: cli.ffmpeg_bin,
            ffprobe_bin: cli.ffprobe_bin,
            http_timeout: Duration::from_secs(positive(cli.http_timeout_secs, "http-timeout-secs")?),
        })
    }
}
