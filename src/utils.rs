//! Utility functions for string truncation, run naming, and file system checks.
//!
//! This module provides helpers used throughout the application:
//! - Character-safe truncation for captions, prompts and log lines
//!   (captions are measured in UTF-16 units, as Telegram does)
//! - Per-run identifiers used to name transient files
//! - Output directory validation at startup

use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use std::fs as stdfs;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Cap a string at `max` characters, ending with `…` when something was cut.
///
/// Prefers to cut at the last whitespace inside the limit so words stay whole.
/// The result never exceeds `max` characters (ellipsis included).
pub fn truncate_chars(s: &str, max: usize) -> String {
    truncate_measured(s, max, |_| 1)
}

/// Like [`truncate_chars`], but `max` counts UTF-16 code units.
///
/// Telegram measures captions this way, so an emoji outside the BMP costs two.
pub fn truncate_utf16(s: &str, max: usize) -> String {
    truncate_measured(s, max, char::len_utf16)
}

fn truncate_measured(s: &str, max: usize, width: impl Fn(char) -> usize) -> String {
    let s = s.trim();
    if s.chars().map(&width).sum::<usize>() <= max {
        return s.to_string();
    }
    let ellipsis = width('…');
    if max < ellipsis {
        return String::new();
    }

    // Room for the ellipsis.
    let budget = max - ellipsis;
    let mut used = 0;
    let mut cut = s.len();
    for (i, c) in s.char_indices() {
        used += width(c);
        if used > budget {
            cut = i;
            break;
        }
    }
    let head = &s[..cut];
    let head = match head.rfind(char::is_whitespace) {
        Some(ws) if ws > cut / 2 => head[..ws].trim_end(),
        _ => head,
    };
    format!("{head}…")
}

/// Build a run identifier from a timestamp plus a short random suffix.
///
/// Two runs started within the same second still get distinct file names.
pub fn run_id(now: DateTime<Utc>) -> String {
    let suffix: u16 = rng().random();
    format!("{}_{:04x}", now.format("%Y%m%d_%H%M%S"), suffix)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Work directory is writable");
    Ok(())
}
