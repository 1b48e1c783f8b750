//! Data models passed between pipeline stages.
//!
//! - [`FeedEntry`]: one keyword → feed URL pair from the registry
//! - [`Alert`]: one feed entry with its destination unwrapped
//! - [`FetchedPage`]: plain text of a rendered destination page
//! - [`Record`]: a schema-shaped object returned by the extractor
//! - [`ResultSet`]: everything collected in one run, grouped by keyword
//!
//! Nothing here outlives a single run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A keyword and the alert feed that tracks it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedEntry {
    pub keyword: String,
    pub feed_url: String,
}

/// A single alert read from a feed.
///
/// `destination_url` is the article the alert points at, never the
/// redirector link wrapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Plain-text title (markup stripped).
    pub title: String,
    /// Absolute URL of the article.
    pub destination_url: String,
    /// Plain-text summary (markup stripped).
    pub summary: String,
}

/// Visible text of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub text: String,
}

impl FetchedPage {
    /// Length in characters, the unit the minimum-content threshold uses.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A validated extraction result.
///
/// Holds exactly the fields declared by the schema it was validated
/// against, in declaration order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Convenience accessor for string-typed fields.
    #[cfg(test)]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    #[cfg(test)]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// One record and the article it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedItem {
    pub source_url: String,
    pub record: Record,
}

/// Records collected from one feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordGroup {
    pub keyword: String,
    pub items: Vec<ExtractedItem>,
}

/// Flattened view of a collected record, used by the file sink.
#[derive(Debug, Serialize)]
pub struct ResultRow<'a> {
    pub keyword: &'a str,
    pub source_url: &'a str,
    pub record: &'a Record,
}

/// Everything one run collected, grouped by feed keyword in registry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub groups: Vec<KeywordGroup>,
}

impl ResultSet {
    /// Start a new (possibly empty) group for the next feed.
    pub fn open_group(&mut self, keyword: &str) {
        self.groups.push(KeywordGroup {
            keyword: keyword.to_string(),
            items: Vec::new(),
        });
    }

    /// Append to the most recently opened group.
    pub fn push(&mut self, source_url: String, record: Record) {
        if let Some(group) = self.groups.last_mut() {
            group.items.push(ExtractedItem { source_url, record });
        }
    }

    /// Number of records across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records in collection order, paired with their keyword.
    pub fn rows(&self) -> impl Iterator<Item = ResultRow<'_>> {
        self.groups.iter().flat_map(|group| {
            group.items.iter().map(move |item| ResultRow {
                keyword: &group.keyword,
                source_url: &item.source_url,
                record: &item.record,
            })
        })
    }
}

/// Counters for one run, logged at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub feeds: usize,
    pub alerts: usize,
    pub fetch_failures: usize,
    pub short_pages: usize,
    pub extraction_failures: usize,
    pub rejected: usize,
    pub collected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::from_fields(map),
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_result_set_counts_across_groups() {
        let mut results = ResultSet::default();
        results.open_group("military");
        results.push("https://a.example/1".into(), record(json!({"x": "1"})));
        results.open_group("navy");
        results.open_group("arms");
        results.push("https://a.example/2".into(), record(json!({"x": "2"})));
        results.push("https://a.example/3".into(), record(json!({"x": "3"})));

        assert_eq!(results.groups.len(), 3);
        assert_eq!(results.len(), 3);
        assert!(!results.is_empty());
        assert!(results.groups[1].items.is_empty());
    }

    #[test]
    fn test_empty_groups_are_still_empty() {
        let mut results = ResultSet::default();
        results.open_group("military");
        assert!(results.is_empty());
    }

    #[test]
    fn test_rows_keep_order_and_keyword() {
        let mut results = ResultSet::default();
        results.open_group("a");
        results.push("u1".into(), record(json!({"n": 1})));
        results.open_group("b");
        results.push("u2".into(), record(json!({"n": 2})));

        let rows: Vec<_> = results.rows().map(|r| (r.keyword, r.source_url)).collect();
        assert_eq!(rows, vec![("a", "u1"), ("b", "u2")]);
    }

    #[test]
    fn test_record_serializes_transparently() {
        let r = record(json!({"company_name": "Acme", "amount": 0}));
        let out = serde_json::to_string(&r).unwrap();
        assert_eq!(out, r#"{"company_name":"Acme","amount":0}"#);
        assert_eq!(r.get_str("company_name"), Some("Acme"));
    }

    #[test]
    fn test_fetched_page_char_len_counts_chars() {
        let page = FetchedPage {
            url: "https://example.com".into(),
            text: "é".repeat(10),
        };
        assert_eq!(page.char_len(), 10);
    }
}
