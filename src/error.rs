//! Error types for every pipeline stage.
//!
//! Only [`ConfigError`] is fatal. Every other error is caught where it
//! happens, logged with the feed keyword or URL, and turns the item into
//! "produced nothing".

use thiserror::Error;

/// Startup problems: the run cannot begin.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The model API credential is not set in the environment.
    #[error("environment variable {0} is not set")]
    MissingCredential(String),

    /// A configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The feed registry is not a JSON object of keyword to URL.
    #[error("malformed feed registry {path}: {reason}")]
    Registry { path: String, reason: String },

    /// The YAML settings file failed to parse.
    #[error("malformed settings file {path}: {source}")]
    Settings {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A job or schema name does not resolve.
    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    /// A combination of options that cannot run.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A feed document that could not be turned into alerts.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Retrieval(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(u16),

    #[error("malformed feed XML: {0}")]
    Xml(String),

    #[error("document is not a recognised feed: {0}")]
    NotAFeed(String),
}

/// A feed entry whose link does not carry a usable destination.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("link is not a valid URL: {0}")]
    InvalidLink(String),

    #[error("link has no 'url' query parameter")]
    MissingDestination,

    #[error("destination is not an absolute URL: {0}")]
    InvalidDestination(String),
}

/// Rendering a page failed or produced nothing.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not start rendering session: {0}")]
    Session(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("navigation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("page has no text content")]
    EmptyContent,
}

/// The model call or its output could not produce a valid record.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("model request failed: {0}")]
    Network(String),

    #[error("model API error: {0}")]
    Api(String),

    #[error("model output is not valid JSON (truncated: {truncated}): {message}")]
    MalformedOutput { message: String, truncated: bool },

    #[error("record does not match schema: {0}")]
    Validation(String),
}

/// Results could not be delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("POST to {endpoint} failed: {reason}")]
    Post { endpoint: String, reason: String },
}
