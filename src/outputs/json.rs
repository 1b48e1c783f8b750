//! JSON file output.
//!
//! The file holds one array with an object per collected record:
//!
//! ```json
//! [
//!   { "keyword": "arms export", "source_url": "https://…", "record": { … } }
//! ]
//! ```
//!
//! A target ending in `.json` is written as-is. Anything else is treated as
//! a directory and the file goes to `{dir}/{date}/{job}_{HHMMSS}.json`.

use super::DeliveryReport;
use crate::error::DeliveryError;
use crate::models::{ResultRow, ResultSet};
use crate::utils::dated_output_path;
use chrono::{DateTime, Local};
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Clone)]
pub struct FileSink {
    target: String,
    job: String,
}

impl FileSink {
    pub fn new(target: &str, job: &str) -> Self {
        Self {
            target: target.to_string(),
            job: job.to_string(),
        }
    }

    /// Directory that must be writable before the run starts.
    pub fn output_dir(&self) -> &str {
        if self.is_file_target() {
            Path::new(&self.target)
                .parent()
                .and_then(Path::to_str)
                .filter(|p| !p.is_empty())
                .unwrap_or(".")
        } else {
            &self.target
        }
    }

    fn is_file_target(&self) -> bool {
        self.target.ends_with(".json")
    }

    /// Where a run finishing at `now` is written.
    pub fn path_at(&self, now: DateTime<Local>) -> String {
        if self.is_file_target() {
            self.target.clone()
        } else {
            dated_output_path(&self.target, &self.job, now)
        }
    }

    #[instrument(level = "info", skip_all, fields(target = %self.target))]
    pub async fn deliver(&self, results: &ResultSet) -> Result<DeliveryReport, DeliveryError> {
        let path = self.path_at(Local::now());
        let count = write_results(results, &path).await?;
        Ok(DeliveryReport {
            destination: path,
            delivered: count,
            failed: 0,
        })
    }
}

/// Serialize `results` as a pretty JSON array and write it to `path`,
/// creating parent directories. Returns the number of records written.
pub async fn write_results(results: &ResultSet, path: &str) -> Result<usize, DeliveryError> {
    let rows: Vec<ResultRow<'_>> = results.rows().collect();
    let json = serde_json::to_string_pretty(&rows)?;

    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        info!(dir = %dir.display(), "Ensuring output directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(DeliveryError::Write {
                path: path.to_string(),
                source: e,
            });
        }
    }

    info!(%path, records = rows.len(), "Writing JSON");
    fs::write(path, json).await.map_err(|source| DeliveryError::Write {
        path: path.to_string(),
        source,
    })?;
    info!(%path, "Wrote results file");
    Ok(rows.len())
}
