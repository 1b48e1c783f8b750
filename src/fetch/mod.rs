//! Content fetching: destination URL in, visible page text out.
//!
//! A [`Renderer`] hands out one [`RenderSession`] per fetch. The
//! [`ContentFetcher`] opens it, navigates with a bounded wait, and closes it
//! again on every path before looking at the result.
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | plain HTTP | [`http`] | served HTML only |
//! | headless Chromium | [`playwright`] | needs `node` + Playwright |

pub mod http;
pub mod playwright;
pub mod text;

use crate::error::FetchError;
use crate::models::FetchedPage;
use std::time::Duration;
use tracing::{debug, instrument};

pub use http::HttpRenderer;
pub use playwright::PlaywrightRenderer;
pub use text::html_to_text;

/// When navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// DOM built; scripts and images may still be loading.
    DomContentLoaded,
}

impl WaitPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitPolicy::DomContentLoaded => "domcontentloaded",
        }
    }
}

/// A live rendering context. Used for at most one navigation.
pub trait RenderSession {
    async fn navigate(&mut self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<String, FetchError>;

    /// Release the session. Must not fail.
    async fn close(self);
}

/// Creates rendering sessions.
pub trait Renderer {
    type Session: RenderSession;

    async fn open(&self) -> Result<Self::Session, FetchError>;
}

/// Something that can produce the text of a page.
pub trait PageSource {
    async fn fetch_content(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// [`PageSource`] over any [`Renderer`], with a hard navigation timeout.
#[derive(Debug)]
pub struct ContentFetcher<R> {
    renderer: R,
    timeout: Duration,
}

impl<R: Renderer> ContentFetcher<R> {
    pub fn new(renderer: R, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }
}

impl<R: Renderer> PageSource for ContentFetcher<R> {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_content(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut session = self.renderer.open().await?;
        let navigation = tokio::time::timeout(
            self.timeout,
            session.navigate(url, WaitPolicy::DomContentLoaded, self.timeout),
        )
        .await;
        session.close().await;

        let html = match navigation {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };

        let text = html_to_text(&html);
        if text.trim().is_empty() {
            return Err(FetchError::EmptyContent);
        }
        debug!(html_bytes = html.len(), chars = text.chars().count(), "Extracted page text");
        Ok(FetchedPage {
            url: url.to_string(),
            text,
        })
    }
}
