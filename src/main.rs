//! # Daily AI News
//!
//! Publishes a short AI news digest to a Telegram channel once or more per
//! day. Each run fetches recent articles from RSS/Atom and NewsAPI feeds,
//! asks Gemini for a structured bundle (headline, bullets, narration script,
//! caption), renders it as a narrated slideshow video or an image card, and
//! uploads the result.
//!
//! ## Features
//!
//! - Feed failures are skipped; an empty fetch skips the run
//! - Overloaded model responses are retried with linear backoff, then replaced
//!   by a title-only fallback bundle
//! - Optional ElevenLabs narration; slides are timed to the audio
//! - One or more `HH:MM` slots per day, local time or UTC
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=... daily_ai_news --at 09:00
//! daily_ai_news --run-now --media image
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: [`sources::FeedSource`] collects, dedupes and ranks articles
//! 2. **Generating**: [`generator::ContentGenerator`] builds the content bundle
//! 3. **Rendering**: [`render::ffmpeg::FfmpegRenderer`] (plus optional narration)
//! 4. **Publishing**: [`publish::TelegramPublisher`] uploads the artifact
//!
//! [`workflow::DailyWorkflow`] runs the steps in order and
//! [`scheduler::run_schedule`] triggers it at the configured times.

use clap::Parser;
use std::error::Error;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod generator;
mod models;
mod publish;
mod render;
mod scheduler;
mod sources;
mod utils;
mod workflow;

use cli::Cli;
use config::Config;
use generator::ContentGenerator;
use generator::gemini::GeminiBackend;
use publish::TelegramPublisher;
use render::ffmpeg::FfmpegRenderer;
use render::tts::ElevenLabsNarrator;
use scheduler::{DailySchedule, run_schedule};
use sources::FeedSource;
use utils::ensure_writable_dir;
use workflow::DailyWorkflow;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // Before tracing and clap so RUST_LOG and option env vars can come from .env.
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "daily_ai_news starting up");
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Could not read .env; using process environment only"),
    }

    // --- Configuration: any problem here is fatal ---
    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        feeds = config.feeds.len(),
        media = %config.media,
        narration = config.narration.is_some(),
        model = %config.gemini.model,
        "Configuration loaded"
    );

    if let Err(e) = ensure_writable_dir(&config.workflow.work_dir).await {
        error!(
            path = %config.workflow.work_dir.display(),
            error = %e,
            "Work directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // --- Collaborators ---
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let source = FeedSource::new(client.clone(), config.feeds.clone(), config.feed_summary_chars);
    let backend = GeminiBackend::new(
        client.clone(),
        config.gemini.api_key.clone(),
        config.gemini.model.clone(),
        config.gemini.base_url.clone(),
    );
    let generator = ContentGenerator::new(backend, config.retry, config.generator);
    let narrator = config.narration.as_ref().map(|n| {
        ElevenLabsNarrator::new(
            client.clone(),
            n.api_key.clone(),
            n.voice_id.clone(),
            n.base_url.clone(),
            config.ffprobe_bin.clone(),
        )
    });
    let renderer = FfmpegRenderer::new(config.render.clone(), config.media, config.ffmpeg_bin.clone());
    let publisher = TelegramPublisher::new(
        client,
        config.telegram.api_base.clone(),
        config.telegram.bot_token.clone(),
        config.telegram.chat_id.clone(),
        config.generator.caption_max_chars,
    );
    let workflow = DailyWorkflow::new(
        source,
        generator,
        narrator,
        renderer,
        publisher,
        config.workflow.clone(),
    );

    // --- Manual path ---
    if config.run_now {
        let run = workflow.run().await;
        info!(run_id = %run.run_id, outcome = ?run.outcome, "Manual run complete");
        return Ok(());
    }

    // --- Daily schedule ---
    let clock = config.clock;
    let schedule = DailySchedule::new(config.schedule.clone(), clock.now());
    let wf = &workflow;
    let runs = run_schedule(
        schedule,
        move || clock.now(),
        config.poll,
        move || async move {
            wf.run().await;
        },
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Could not listen for Ctrl-C; stop the process to exit");
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    info!(runs, "daily_ai_news shutting down");
    Ok(())
}
