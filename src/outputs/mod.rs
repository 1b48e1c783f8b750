//! Result delivery.
//!
//! # Sinks
//!
//! - [`json`]: one pretty-printed JSON file per run
//! - [`http`]: one `POST` per record to an ingestion endpoint
//! - stdout: the keyword / url / record listing, for eyeballing a run
//!
//! # Output Structure
//!
//! ```text
//! output/
//! └── 2025-05-06/
//!     ├── arms-exports_073000.json
//!     └── transactions_120512.json
//! ```
//!
//! An empty [`ResultSet`] is never delivered.

pub mod http;
pub mod json;

use crate::config::{Settings, SinkKind};
use crate::error::{ConfigError, DeliveryError};
use crate::models::ResultSet;
use tracing::info;

pub use http::HttpSink;
pub use json::FileSink;

/// What a delivery achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Where the records went: a file path, an endpoint, or `stdout`.
    pub destination: String,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum Sink {
    File(FileSink),
    Http(HttpSink),
    Stdout,
}

impl Sink {
    /// Pick the sink the settings ask for. `job` names the output file.
    pub fn from_settings(settings: &Settings, job: &str) -> Result<Self, ConfigError> {
        Ok(match settings.sink {
            SinkKind::File => Sink::File(FileSink::new(&settings.output, job)),
            SinkKind::Http => Sink::Http(HttpSink::new(settings)?),
            SinkKind::Stdout => Sink::Stdout,
        })
    }

    #[cfg(test)]
    pub fn kind(&self) -> SinkKind {
        match self {
            Sink::File(_) => SinkKind::File,
            Sink::Http(_) => SinkKind::Http,
            Sink::Stdout => SinkKind::Stdout,
        }
    }

    pub async fn deliver(&self, results: &ResultSet) -> Result<DeliveryReport, DeliveryError> {
        if results.is_empty() {
            info!("No relevant records; nothing delivered");
            return Ok(DeliveryReport::default());
        }
        match self {
            Sink::File(sink) => sink.deliver(results).await,
            Sink::Http(sink) => Ok(sink.deliver(results).await),
            Sink::Stdout => print_results(results),
        }
    }
}

fn print_results(results: &ResultSet) -> Result<DeliveryReport, DeliveryError> {
    let mut delivered = 0;
    for group in &results.groups {
        println!("keyword: {}\n", group.keyword);
        for item in &group.items {
            println!("url: {}", item.source_url);
            println!("{}\n", serde_json::to_string_pretty(&item.record)?);
            delivered += 1;
        }
    }
    Ok(DeliveryReport {
        destination: "stdout".to_string(),
        delivered,
        failed: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_results_are_not_delivered() {
        let dir = std::env::temp_dir().join(format!("alert_extract_empty_{}", std::process::id()));
        let sink = Sink::File(FileSink::new(dir.to_str().unwrap(), "arms-exports"));

        let mut results = ResultSet::default();
        results.open_group("arms export");
        let report = sink.deliver(&results).await.unwrap();

        assert_eq!(report, DeliveryReport::default());
        assert!(!dir.exists());
    }

    #[test]
    fn test_sink_from_settings() {
        let settings = Settings::default();
        assert_eq!(Sink::from_settings(&settings, "j").unwrap().kind(), SinkKind::File);

        let settings = Settings {
            sink: SinkKind::Http,
            endpoint: Some("https://ingest.example.org/api/transaction".into()),
            ..Settings::default()
        };
        assert_eq!(Sink::from_settings(&settings, "j").unwrap().kind(), SinkKind::Http);
    }
}
