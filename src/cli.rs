//! Command-line interface.
//!
//! Every option can also come from the environment. Values given here
//! override the settings file.

use crate::config::{RendererKind, SinkKind};
use clap::Parser;
use std::path::PathBuf;

/// Read keyword alert feeds, fetch the linked articles, and extract
/// structured records from them with a language model.
///
/// # Examples
///
/// ```sh
/// # Arms-export records from feeds.json into ./output/<date>/
/// alert_extract
///
/// # Canadian transactions, posted to an ingestion endpoint
/// alert_extract --job transactions --sink http --endpoint https://ingest.example.org/api/transaction
///
/// # Custom settings, rendered with headless Chromium
/// alert_extract -c settings.yaml --renderer playwright
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file mapping keywords to alert feed URLs
    #[arg(short, long, env = "ALERT_FEEDS", default_value = "feeds.json")]
    pub feeds: PathBuf,

    /// Optional path to a settings.yaml file
    #[arg(short, long, env = "ALERT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Extraction job to run (arms-exports, transactions, news-items, or one from the settings file)
    #[arg(short, long, env = "ALERT_JOB", default_value = "arms-exports")]
    pub job: String,

    /// Where results go
    #[arg(short, long, env = "ALERT_SINK", value_enum)]
    pub sink: Option<SinkKind>,

    /// Output directory, or a .json file path, for the file sink
    #[arg(short, long, env = "ALERT_OUTPUT")]
    pub output: Option<String>,

    /// Ingestion endpoint for the http sink
    #[arg(long, env = "ALERT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Page renderer
    #[arg(long, env = "ALERT_RENDERER", value_enum)]
    pub renderer: Option<RendererKind>,

    /// Model name
    #[arg(long, env = "ALERT_MODEL")]
    pub model: Option<String>,

    /// Environment variable that holds the model API key
    #[arg(long)]
    pub api_key_env: Option<String>,
}
