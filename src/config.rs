//! Runtime settings.
//!
//! [`Settings`] is built once at startup from an optional YAML file plus CLI
//! overrides, then passed by reference to every component constructor.
//! The model credential lives separately in [`ApiKey`] and is only ever read
//! from the environment.
//!
//! ```yaml
//! model: gemini-2.0-flash-lite
//! min_content_chars: 150
//! request_delay_ms: 1000
//! renderer: playwright
//! sink: http
//! endpoint: https://ingest.example.org/api/transaction
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::extract::SchemaDescriptor;
use crate::jobs::JobSpec;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument};

/// Page rendering backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Plain HTTP GET of the served HTML.
    #[default]
    Http,
    /// Headless Chromium via Playwright (requires node).
    Playwright,
}

/// Where results go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Pretty-printed JSON file.
    #[default]
    File,
    /// One POST per record.
    Http,
    /// Print to the console.
    Stdout,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub model: String,
    pub api_base_url: String,
    /// Environment variable holding the model API key.
    pub api_key_env: String,
    pub model_timeout_secs: u64,
    /// Pages with fewer characters are never sent to the model.
    pub min_content_chars: usize,
    /// Pause after every model call.
    pub request_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub feed_timeout_secs: u64,
    pub user_agent: String,
    pub renderer: RendererKind,
    pub node_binary: String,
    pub sink: SinkKind,
    /// Directory (or `.json` file) for the file sink.
    pub output: String,
    /// Ingestion endpoint for the HTTP sink.
    pub endpoint: Option<String>,
    pub schemas: Vec<SchemaDescriptor>,
    pub jobs: Vec<JobSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash-lite".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            model_timeout_secs: 120,
            min_content_chars: 150,
            request_delay_ms: 1000,
            fetch_timeout_secs: 60,
            feed_timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            renderer: RendererKind::default(),
            node_binary: "node".to_string(),
            sink: SinkKind::default(),
            output: "output".to_string(),
            endpoint: None,
            schemas: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings from a YAML file, or use defaults when no file is given.
    #[instrument(level = "info", skip_all)]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_yaml(&raw).map_err(|source| ConfigError::Settings {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file means "all defaults"
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply command-line overrides on top of file values.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(sink) = cli.sink {
            self.sink = sink;
        }
        if let Some(output) = &cli.output {
            self.output = output.clone();
        }
        if let Some(endpoint) = &cli.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(renderer) = cli.renderer {
            self.renderer = renderer;
        }
        if let Some(model) = &cli.model {
            self.model = model.clone();
        }
        if let Some(var) = &cli.api_key_env {
            self.api_key_env = var.clone();
        }
        self
    }

    /// Reject settings that cannot produce a working run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sink == SinkKind::Http && self.endpoint.as_deref().is_none_or(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid("the http sink needs an endpoint".into()));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| ConfigError::Invalid(format!("endpoint '{endpoint}': {e}")))?;
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_secs must be positive".into()));
        }
        if self.feed_timeout_secs == 0 {
            return Err(ConfigError::Invalid("feed_timeout_secs must be positive".into()));
        }
        for schema in &self.schemas {
            schema.check()?;
        }
        Ok(())
    }
}

/// The model API credential. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    #[cfg(test)]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from `var`. Unset or blank is a fatal configuration error.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(ConfigError::MissingCredential(var.to_string())),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
