//! Static keyword → feed URL registry.
//!
//! The registry is a JSON object such as:
//!
//! ```json
//! {
//!   "military": "https://www.google.com/alerts/feeds/0000/1111",
//!   "arms export": "https://www.google.com/alerts/feeds/0000/2222"
//! }
//! ```
//!
//! Entry order follows the document.

use crate::error::ConfigError;
use crate::models::FeedEntry;
use serde_json::Value;
use std::path::Path;
use tracing::{info, instrument};

/// Load the registry from `path`. Any problem is fatal for the run.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_feeds(path: impl AsRef<Path>) -> Result<Vec<FeedEntry>, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let feeds = parse_feeds(&raw).map_err(|reason| ConfigError::Registry {
        path: path.display().to_string(),
        reason,
    })?;
    info!(count = feeds.len(), "Loaded feed registry");
    Ok(feeds)
}

fn parse_feeds(raw: &str) -> Result<Vec<FeedEntry>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let Value::Object(map) = value else {
        return Err("expected a JSON object of keyword to feed URL".to_string());
    };

    map.into_iter()
        .map(|(keyword, url)| match url {
            Value::String(feed_url) => Ok(FeedEntry { keyword, feed_url }),
            other => Err(format!("feed '{keyword}' has non-string URL {other}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_document_order() {
        let feeds = parse_feeds(
            r#"{"zulu": "http://feed/z", "alpha": "http://feed/a", "mike": "http://feed/m"}"#,
        )
        .unwrap();
        let keywords: Vec<_> = feeds.iter().map(|f| f.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["zulu", "alpha", "mike"]);
        assert_eq!(feeds[1].feed_url, "http://feed/a");
    }

    #[test]
    fn test_parse_empty_object() {
        assert!(parse_feeds("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_array_root() {
        let err = parse_feeds(r#"["http://feed/a"]"#).unwrap_err();
        assert!(err.contains("JSON object"));
    }

    #[test]
    fn test_parse_rejects_non_string_url() {
        let err = parse_feeds(r#"{"military": 42}"#).unwrap_err();
        assert!(err.contains("military"));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(parse_feeds(r#"{"military": "http://feed/a""#).is_err());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = load_feeds("/definitely/not/here/feeds.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("alert_extract_feeds_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"military": "http://feed/a"}"#).unwrap();
        let feeds = load_feeds(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(
            feeds,
            vec![FeedEntry {
                keyword: "military".into(),
                feed_url: "http://feed/a".into()
            }]
        );
    }

    #[test]
    fn test_load_malformed_file_is_registry_error() {
        let path = std::env::temp_dir().join(format!("alert_extract_bad_feeds_{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        let err = load_feeds(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, ConfigError::Registry { .. }));
    }
}
