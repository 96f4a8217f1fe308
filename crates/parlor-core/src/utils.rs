//! Utility helpers — path resolution, timestamps, filename checks.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};

/// Format of message timestamps on disk (local time, second precision).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get the Parlor data directory (e.g. `~/.parlor/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".parlor")
}

/// Current local time truncated to whole seconds.
pub fn now_local() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Whether `s` can be used verbatim as a single path component.
///
/// Only ASCII alphanumerics, `-`, `_` and `.` are allowed, and the special
/// names `.` and `..` are rejected.
pub fn is_safe_filename(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// File extension of `filename` including the leading dot, or `""`.
///
/// Only ASCII alphanumeric extensions are kept.
pub fn extension_with_dot(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Guess an image MIME type from a filename extension.
pub fn image_content_type(filename: &str) -> Option<&'static str> {
    let ext = extension_with_dot(filename).to_lowercase();
    match ext.as_str() {
        ".png" => Some("image/png"),
        ".jpg" | ".jpeg" => Some("image/jpeg"),
        ".webp" => Some("image/webp"),
        ".gif" => Some("image/gif"),
        _ => None,
    }
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(rest)
    } else if path == "~" {
        home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(path)
    }
}

/// Helper to get home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}
