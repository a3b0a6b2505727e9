//! Error types for each stage of the daily pipeline.
//!
//! Every collaborator reports failures through its own enum so the workflow
//! can tell a recoverable condition (one dead feed, an overloaded model) from
//! one that ends the run (encoder crash, rejected upload) or the process
//! (missing credentials).

use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration problems. Always fatal to the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0} (set it as an environment variable or pass the flag)")]
    Missing(&'static str),

    #[error("invalid schedule time {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("could not read feeds file {path}: {source}")]
    FeedsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse feeds file {path}: {source}")]
    FeedsFormat {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failure of a single feed. Logged and skipped by the news source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed answered with status {0}")]
    Status(u16),

    #[error("could not parse feed: {0}")]
    Parse(String),
}

/// Generative backend failures, split by whether a retry can help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Temporary unavailability (overloaded model, rate limit, timeout).
    #[error("backend overloaded: {0}")]
    Overloaded(String),

    /// Authentication, bad request or unusable response.
    #[error("backend failure: {0}")]
    Permanent(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Overloaded(_))
    }
}

/// Narration or rendering failures. Fatal for the current run.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("could not read media duration: {0}")]
    Probe(String),

    #[error("text-to-speech failed: {0}")]
    Speech(String),

    #[error("nothing to render: {0}")]
    Empty(&'static str),
}

/// Publishing failures. Fatal for the current run and never retried.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("could not read artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected upload ({status}): {description}")]
    Rejected { status: u16, description: String },
}
