//! HTTP ingestion output: each record is posted on its own as a JSON body.
//!
//! Posts go out one at a time in collection order. A failed post is logged
//! and counted; the remaining records are still sent.

use super::DeliveryReport;
use crate::config::Settings;
use crate::error::{ConfigError, DeliveryError};
use crate::models::{Record, ResultSet};
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const POST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let endpoint = settings
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("the http sink needs an endpoint".into()))?;
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(POST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("sink HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    /// Send one record. Any non-2xx answer is a failure.
    pub async fn post_record(&self, record: &Record) -> Result<(), DeliveryError> {
        let failed = |reason: String| DeliveryError::Post {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status.as_u16())));
        }
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint))]
    pub async fn deliver(&self, results: &ResultSet) -> DeliveryReport {
        let t0 = Instant::now();
        let outcomes: Vec<bool> = stream::iter(results.rows())
            .then(|row| async move {
                match self.post_record(row.record).await {
                    Ok(()) => {
                        debug!(keyword = %row.keyword, url = %row.source_url, "Posted record");
                        true
                    }
                    Err(e) => {
                        warn!(keyword = %row.keyword, url = %row.source_url, error = %e, "Failed to post record");
                        false
                    }
                }
            })
            .collect()
            .await;

        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let failed = outcomes.len() - delivered;
        info!(
            delivered,
            failed,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Finished posting records"
        );
        DeliveryReport {
            destination: self.endpoint.clone(),
            delivered,
            failed,
        }
    }
}
