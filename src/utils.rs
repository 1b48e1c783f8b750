//! Small helpers for text cleanup, logging, and output paths.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static INLINE_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\u{a0}\u{200b}]+").expect("static regex"));

/// Normalise whitespace in extracted text.
///
/// Runs of spaces/tabs collapse to one space, every line is trimmed, and
/// blank lines are dropped.
pub fn collapse_whitespace(s: &str) -> String {
    s.lines()
        .map(|line| INLINE_SPACE.replace_all(line.trim(), " "))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the last char boundary before `max` bytes and
/// get an ellipsis plus the number of dropped bytes.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A model response cut off by its token limit fails with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// File name for a run's output: `<job>_<HHMMSS>.json` under a
/// `<YYYY-MM-DD>` directory.
pub fn dated_output_path(dir: &str, job: &str, now: DateTime<Local>) -> String {
    format!(
        "{}/{}/{}_{}.json",
        dir.trim_end_matches('/'),
        now.format("%Y-%m-%d"),
        job,
        now.format("%H%M%S")
    )
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Sync write keeps the error surface simple
    let scratch = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&scratch) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10); // 2 bytes each
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("éé…"));
        assert!(result.contains("(+16 bytes)"));
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let json_bad = r#"{"field": nope}"#;
        let err = serde_json::from_str::<serde_json::Value>(json_bad).unwrap_err();
        assert!(!looks_truncated(&err));
    }

    #[test]
    fn test_collapse_whitespace() {
        let raw = "  Title\t\there \n\n\n   body   text\u{a0}\u{a0}end  \n \n";
        assert_eq!(collapse_whitespace(raw), "Title here\nbody text end");
    }

    #[test]
    fn test_collapse_whitespace_blank_input() {
        assert_eq!(collapse_whitespace(" \n\t \n"), "");
    }

    #[test]
    fn test_dated_output_path() {
        let now = Local.with_ymd_and_hms(2025, 5, 6, 20, 30, 5).unwrap();
        assert_eq!(
            dated_output_path("out/", "arms-exports", now),
            "out/2025-05-06/arms-exports_203005.json"
        );
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let dir = std::env::temp_dir().join(format!("alert_extract_writable_{}", std::process::id()));
        let path = dir.to_string_lossy().to_string();
        ensure_writable_dir(&path).await.unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
