//! Command-line interface definitions for the daily AI news publisher.
//!
//! Every option can also come from an environment variable (or a `.env`
//! file loaded at startup). Credentials are optional at the clap level so
//! that a missing one is reported as a configuration error by
//! [`Config::from_cli`](crate::config::Config::from_cli) instead of a usage
//! message.

use crate::generator::gemini;
use crate::models::MediaKind;
use crate::publish;
use crate::render::tts;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Kind of media to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaArg {
    /// Narrated slideshow video
    Video,
    /// Single headline card
    Image,
}

impl From<MediaArg> for MediaKind {
    fn from(arg: MediaArg) -> Self {
        match arg {
            MediaArg::Video => MediaKind::Video,
            MediaArg::Image => MediaKind::Image,
        }
    }
}

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Publish every day at 09:00 and 14:00 local time
/// daily_ai_news --at 09:00 --at 14:00
///
/// # Run once right now, as an image card, with custom feeds
/// daily_ai_news --run-now --media image --feeds feeds.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model used for generation
    #[arg(long, env = "GEMINI_MODEL", default_value = gemini::DEFAULT_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = gemini::DEFAULT_BASE_URL, hide = true)]
    pub gemini_base_url: String,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat or channel id
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    #[arg(long, env = "TELEGRAM_API_BASE", default_value = publish::DEFAULT_API_BASE, hide = true)]
    pub telegram_api_base: String,

    /// ElevenLabs API key; enables narration when set
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_api_key: Option<String>,

    /// ElevenLabs voice id
    #[arg(long, env = "ELEVENLABS_VOICE_ID", default_value = tts::DEFAULT_VOICE_ID)]
    pub elevenlabs_voice_id: String,

    #[arg(long, env = "ELEVENLABS_BASE_URL", default_value = tts::DEFAULT_BASE_URL, hide = true)]
    pub elevenlabs_base_url: String,

    /// YAML file listing feeds (`- {name, url, kind: rss|newsapi}`)
    #[arg(long, env = "NEWS_FEEDS_FILE")]
    pub feeds: Option<PathBuf>,

    /// Time of day to publish (HH:MM); repeat for several runs a day
    #[arg(long = "at", env = "SCHEDULE_AT", value_delimiter = ',', default_value = "09:00")]
    pub at: Vec<String>,

    /// Interpret --at in UTC instead of local time
    #[arg(long, env = "SCHEDULE_UTC")]
    pub utc: bool,

    /// Seconds between schedule checks
    #[arg(long, default_value_t = 60)]
    pub poll_secs: u64,

    /// Run the workflow once immediately and exit
    #[arg(long)]
    pub run_now: bool,

    /// Media kind to publish
    #[arg(long, value_enum, env = "MEDIA_KIND", default_value = "video")]
    pub media: MediaArg,

    /// Directory for transient media files
    #[arg(short, long, env = "WORK_DIR", default_value = "videos")]
    pub work_dir: PathBuf,

    /// TrueType font used on slides (ffmpeg default font when unset)
    #[arg(long, env = "FONT_FILE")]
    pub font_file: Option<PathBuf>,

    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    pub ffmpeg_bin: PathBuf,

    #[arg(long, env = "FFPROBE_BIN", default_value = "ffprobe")]
    pub ffprobe_bin: PathBuf,

    /// Articles kept per run
    #[arg(long, default_value_t = 5)]
    pub max_articles: usize,

    /// Only articles published within this many hours are used
    #[arg(long, default_value_t = 48)]
    pub recency_hours: i64,

    /// Caption length limit, hashtags included (Telegram allows 1024)
    #[arg(long, default_value_t = 1024)]
    pub caption_max_chars: usize,

    /// Summary characters per article in the prompt
    #[arg(long, default_value_t = 200)]
    pub prompt_summary_chars: usize,

    /// Summary characters kept from each feed entry
    #[arg(long, default_value_t = 500)]
    pub feed_summary_chars: usize,

    /// Longest narration segment shown on one slide
    #[arg(long, default_value_t = 120)]
    pub segment_max_chars: usize,

    /// Slide length when there is no narration
    #[arg(long, default_value_t = 8)]
    pub seconds_per_segment: u64,

    /// Retries after an overloaded response from the model
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base backoff in seconds; the n-th retry waits n times this
    #[arg(long, default_value_t = 5)]
    pub retry_base_secs: u64,

    /// HTTP timeout in seconds for every outbound call
    #[arg(long, default_value_t = 120)]
    pub http_timeout_secs: u64,
}
