//! Alert feed retrieval and parsing.
//!
//! Alert feeds (Google Alerts and similar) wrap every article link in a
//! click-through redirector:
//!
//! ```text
//! https://www.google.com/url?rct=j&sa=t&url=https://www.example.com/story&ct=ga
//! ```
//!
//! [`parse_alerts`] turns an RSS, Atom or JSON feed document into
//! [`Alert`]s carrying the unwrapped destination. Entries whose link cannot
//! be unwrapped are dropped one by one; a malformed document yields an
//! error that [`FeedReader`] downgrades to "no alerts".

use crate::config::Settings;
use crate::error::{ConfigError, FeedError, LinkError};
use crate::models::Alert;
use crate::utils::collapse_whitespace;
use feed_rs::model::Link;
use feed_rs::parser::{self, ParseFeedError};
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Something that can turn a feed URL into alerts.
///
/// Implementations never fail: retrieval and parse problems are logged and
/// produce an empty list.
pub trait FeedSource {
    async fn read_feed(&self, feed_url: &str) -> Vec<Alert>;
}

/// Reads feeds over HTTP.
#[derive(Debug, Clone)]
pub struct FeedReader {
    client: reqwest::Client,
}

impl FeedReader {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.feed_timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("feed HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_document(&self, feed_url: &str) -> Result<String, FeedError> {
        let response = self.client.get(feed_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

impl FeedSource for FeedReader {
    #[instrument(level = "info", skip_all, fields(%feed_url))]
    async fn read_feed(&self, feed_url: &str) -> Vec<Alert> {
        let document = match self.fetch_document(feed_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Could not retrieve feed; skipping");
                return Vec::new();
            }
        };

        match parse_alerts(&document) {
            Ok(alerts) => {
                info!(count = alerts.len(), "Read alerts from feed");
                alerts
            }
            Err(e) => {
                warn!(error = %e, "Error parsing feed; skipping");
                Vec::new()
            }
        }
    }
}

/// Parse a feed document into alerts, in document order.
pub fn parse_alerts(xml: &str) -> Result<Vec<Alert>, FeedError> {
    let xml = scrub_html_entities(xml);
    let feed = parser::parse(xml.as_bytes()).map_err(|e| match e {
        ParseFeedError::ParseError(kind) => FeedError::NotAFeed(format!("{kind:?}")),
        other => FeedError::Xml(other.to_string()),
    })?;

    let total = feed.entries.len();
    let alerts: Vec<Alert> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry.title.map(|t| plain_text(&t.content)).unwrap_or_default();
            let link = entry_link(&entry.links);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            match unwrap_redirect(&link) {
                Ok(destination_url) => Some(Alert {
                    title,
                    destination_url,
                    summary: plain_text(&summary),
                }),
                Err(e) => {
                    warn!(%title, %link, error = %e, "Could not parse URL for entry; dropping");
                    None
                }
            }
        })
        .collect();

    debug!(total, kept = alerts.len(), "Parsed feed entries");
    Ok(alerts)
}

/// The article link of an entry: the alternate link if marked, else the first.
fn entry_link(links: &[Link]) -> String {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
        .unwrap_or_default()
}

/// Extract the destination carried in a redirector link's `url` parameter.
///
/// The returned string is the percent-decoded parameter value, unchanged
/// otherwise. It must itself be an absolute URL.
pub fn unwrap_redirect(link: &str) -> Result<String, LinkError> {
    let link = link.trim();
    let parsed = Url::parse(link).map_err(|e| LinkError::InvalidLink(format!("{link}: {e}")))?;

    let destination = parsed
        .query_pairs()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or(LinkError::MissingDestination)?;

    match Url::parse(&destination) {
        Ok(url) if !url.cannot_be_a_base() => Ok(destination),
        _ => Err(LinkError::InvalidDestination(destination)),
    }
}

/// Strip markup from an HTML snippet and decode its entities.
fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text).replace('\n', " ")
}

/// HTML entities that are not valid XML but show up in real feeds.
fn scrub_html_entities(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
