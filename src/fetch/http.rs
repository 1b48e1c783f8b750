//! Plain HTTP renderer: the served HTML, no JavaScript.
//!
//! Good enough for most news sites and needs nothing installed beyond this
//! binary.

use super::{RenderSession, Renderer, WaitPolicy};
use crate::config::Settings;
use crate::error::{ConfigError, FetchError};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("page HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

/// Per-fetch handle. Shares the connection pool; nothing to tear down.
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
}

impl Renderer for HttpRenderer {
    type Session = HttpSession;

    async fn open(&self) -> Result<HttpSession, FetchError> {
        Ok(HttpSession {
            client: self.client.clone(),
        })
    }
}

impl RenderSession for HttpSession {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn navigate(&mut self, url: &str, _wait: WaitPolicy, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Navigation(format!("HTTP {}", status.as_u16())));
        }
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;
        debug!(bytes = body.len(), "Downloaded page");
        Ok(body)
    }

    async fn close(self) {}
}
