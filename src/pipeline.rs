//! The orchestrator: feeds → alerts → pages → records.
//!
//! Everything runs strictly in sequence: one feed at a time in registry
//! order, one alert at a time in feed order, at most one model call in
//! flight. Any failure past startup skips the item it belongs to and the
//! run carries on.

use crate::config::Settings;
use crate::error::{ExtractionError, FetchError};
use crate::extract::RecordExtractor;
use crate::feeds::FeedSource;
use crate::fetch::PageSource;
use crate::jobs::Job;
use crate::models::{Alert, FeedEntry, Record, ResultSet, RunStats};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// What happened to one alert.
#[derive(Debug)]
pub enum Outcome {
    Collected(Record),
    FetchFailed(FetchError),
    /// Page text below the minimum; the model was not asked.
    TooShort(usize),
    ExtractionFailed(ExtractionError),
    /// Valid record, but the listed signal fields are empty.
    Irrelevant(Vec<String>),
}

pub struct Pipeline<F, P, X> {
    feeds: F,
    pages: P,
    extractor: X,
    min_content_chars: usize,
    request_delay: Duration,
}

pub struct PipelineBuilder<F, P, X> {
    pipeline: Pipeline<F, P, X>,
}

impl<F, P, X> PipelineBuilder<F, P, X> {
    /// Take thresholds and pacing from settings.
    pub fn settings(self, settings: &Settings) -> Self {
        self.min_content_chars(settings.min_content_chars)
            .request_delay(Duration::from_millis(settings.request_delay_ms))
    }

    pub fn min_content_chars(mut self, chars: usize) -> Self {
        self.pipeline.min_content_chars = chars;
        self
    }

    /// Pause after every model call.
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.pipeline.request_delay = delay;
        self
    }

    pub fn build(self) -> Pipeline<F, P, X> {
        self.pipeline
    }
}

impl<F, P, X> Pipeline<F, P, X>
where
    F: FeedSource,
    P: PageSource,
    X: RecordExtractor,
{
    pub fn builder(feeds: F, pages: P, extractor: X) -> PipelineBuilder<F, P, X> {
        let defaults = Settings::default();
        PipelineBuilder {
            pipeline: Pipeline {
                feeds,
                pages,
                extractor,
                min_content_chars: defaults.min_content_chars,
                request_delay: Duration::from_millis(defaults.request_delay_ms),
            },
        }
    }

    /// Run `job` over every feed and collect the records, grouped by keyword.
    #[instrument(level = "info", skip_all, fields(job = %job.name, feeds = feeds.len()))]
    pub async fn run(&self, feeds: &[FeedEntry], job: &Job) -> (ResultSet, RunStats) {
        let start = Instant::now();
        let mut results = ResultSet::default();
        let mut stats = RunStats {
            feeds: feeds.len(),
            ..RunStats::default()
        };

        for (i, entry) in feeds.iter().enumerate() {
            info!(index = i, keyword = %entry.keyword, "Reading feed");
            results.open_group(&entry.keyword);

            let alerts = self.feeds.read_feed(&entry.feed_url).await;
            stats.alerts += alerts.len();
            if alerts.is_empty() {
                info!(keyword = %entry.keyword, "Feed has no usable alerts");
                continue;
            }

            let mut kept = 0usize;
            for alert in &alerts {
                match self.process_alert(alert, job).await {
                    Outcome::Collected(record) => {
                        results.push(alert.destination_url.clone(), record);
                        stats.collected += 1;
                        kept += 1;
                    }
                    Outcome::FetchFailed(e) => {
                        warn!(url = %alert.destination_url, error = %e, "Fetch failed; skipping alert");
                        stats.fetch_failures += 1;
                    }
                    Outcome::TooShort(chars) => {
                        info!(
                            url = %alert.destination_url,
                            chars,
                            min = self.min_content_chars,
                            "Not enough content; skipping alert"
                        );
                        stats.short_pages += 1;
                    }
                    Outcome::ExtractionFailed(e) => {
                        warn!(url = %alert.destination_url, error = %e, "Extraction failed; skipping alert");
                        stats.extraction_failures += 1;
                    }
                    Outcome::Irrelevant(missing) => {
                        info!(
                            url = %alert.destination_url,
                            missing = %missing.join(","),
                            "Insufficient info; record dropped"
                        );
                        stats.rejected += 1;
                    }
                }
            }
            info!(keyword = %entry.keyword, alerts = alerts.len(), kept, "Feed done");
        }

        info!(
            collected = stats.collected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );
        (results, stats)
    }

    /// Fetch, gate, extract and filter one alert.
    pub async fn process_alert(&self, alert: &Alert, job: &Job) -> Outcome {
        let page = match self.pages.fetch_content(&alert.destination_url).await {
            Ok(page) => page,
            Err(e) => return Outcome::FetchFailed(e),
        };

        let chars = page.char_len();
        if chars < self.min_content_chars {
            return Outcome::TooShort(chars);
        }

        debug!(url = %page.url, chars, "Extracting record");
        let extracted = self
            .extractor
            .extract(&page.text, &job.schema, job.instructions.as_deref())
            .await;
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let record = match extracted {
            Ok(record) => record,
            Err(e) => return Outcome::ExtractionFailed(e),
        };

        if job.relevance_filter {
            let missing = job.schema.missing_signals(&record);
            if !missing.is_empty() {
                return Outcome::Irrelevant(missing.into_iter().map(str::to_string).collect());
            }
        }
        Outcome::Collected(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SchemaDescriptor;
    use crate::models::FetchedPage;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const LONG: &str = "General Dynamics Land Systems Canada signed a contract to deliver light armoured \
vehicles to Saudi Arabia. The deal is worth fifteen billion dollars and runs for fourteen years.";

    #[derive(Default)]
    struct StubFeeds {
        feeds: HashMap<String, Vec<Alert>>,
        reads: Mutex<Vec<String>>,
    }

    impl StubFeeds {
        fn with(mut self, feed_url: &str, destinations: &[&str]) -> Self {
            let alerts = destinations
                .iter()
                .map(|d| Alert {
                    title: format!("title for {d}"),
                    destination_url: d.to_string(),
                    summary: String::new(),
                })
                .collect();
            self.feeds.insert(feed_url.to_string(), alerts);
            self
        }
    }

    impl FeedSource for StubFeeds {
        async fn read_feed(&self, feed_url: &str) -> Vec<Alert> {
            self.reads.lock().unwrap().push(feed_url.to_string());
            self.feeds.get(feed_url).cloned().unwrap_or_default()
        }
    }

    /// Maps URL to page text; `None` means the fetch fails.
    #[derive(Default)]
    struct StubPages {
        pages: HashMap<String, Option<String>>,
    }

    impl StubPages {
        fn page(mut self, url: &str, text: &str) -> Self {
            self.pages.insert(url.to_string(), Some(text.to_string()));
            self
        }

        fn broken(mut self, url: &str) -> Self {
            self.pages.insert(url.to_string(), None);
            self
        }
    }

    impl PageSource for StubPages {
        async fn fetch_content(&self, url: &str) -> Result<FetchedPage, FetchError> {
            match self.pages.get(url) {
                Some(Some(text)) => Ok(FetchedPage {
                    url: url.to_string(),
                    text: text.clone(),
                }),
                _ => Err(FetchError::Navigation("net::ERR_CONNECTION_REFUSED".into())),
            }
        }
    }

    /// Answers by matching a marker in the page text; records every call.
    #[derive(Default)]
    struct StubExtractor {
        answers: Vec<(&'static str, Result<serde_json::Value, &'static str>)>,
        calls: Mutex<Vec<String>>,
    }

    impl StubExtractor {
        fn answer(mut self, marker: &'static str, value: serde_json::Value) -> Self {
            self.answers.push((marker, Ok(value)));
            self
        }

        fn fail(mut self, marker: &'static str, message: &'static str) -> Self {
            self.answers.push((marker, Err(message)));
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl RecordExtractor for StubExtractor {
        async fn extract(
            &self,
            text: &str,
            schema: &SchemaDescriptor,
            _extra_instructions: Option<&str>,
        ) -> Result<Record, ExtractionError> {
            self.calls.lock().unwrap().push(text.to_string());
            let (_, answer) = self
                .answers
                .iter()
                .find(|(marker, _)| text.contains(marker))
                .ok_or_else(|| ExtractionError::Api("no canned answer".into()))?;
            match answer {
                Ok(value) => schema.validate_value(value.clone()),
                Err(message) => Err(ExtractionError::Network(message.to_string())),
            }
        }
    }

    fn entry(keyword: &str, feed_url: &str) -> FeedEntry {
        FeedEntry {
            keyword: keyword.to_string(),
            feed_url: feed_url.to_string(),
        }
    }

    fn pipeline<F: FeedSource, P: PageSource, X: RecordExtractor>(f: F, p: P, x: X) -> Pipeline<F, P, X> {
        Pipeline::builder(f, p, x).request_delay(Duration::ZERO).build()
    }

    fn deal(company: &str) -> serde_json::Value {
        json!({
            "transaction_type": "Purchase Order",
            "company_division": company,
            "recipient": "Saudi Arabia",
            "amount": 15000000000u64,
        })
    }

    #[tokio::test]
    async fn test_relevant_record_is_collected() {
        let feeds = StubFeeds::default().with("feed-a", &["https://news.example/deal"]);
        let pages = StubPages::default().page("https://news.example/deal", &format!("GDLS {LONG}"));
        let extractor = StubExtractor::default().answer("GDLS", deal("GDLS-Canada"));
        let p = pipeline(feeds, pages, extractor);

        let (results, stats) = p.run(&[entry("arms export", "feed-a")], &Job::arms_exports()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results.groups[0].keyword, "arms export");
        let item = &results.groups[0].items[0];
        assert_eq!(item.source_url, "https://news.example/deal");
        assert_eq!(item.record.get_str("company_division"), Some("GDLS-Canada"));
        assert_eq!(item.record.get_str("city"), Some(""));
        assert_eq!(stats.collected, 1);
    }

    #[tokio::test]
    async fn test_short_page_never_reaches_extractor() {
        let feeds = StubFeeds::default().with("feed-a", &["https://news.example/stub"]);
        let pages = StubPages::default().page("https://news.example/stub", "Subscribe to read more.");
        let extractor = StubExtractor::default().answer("Subscribe", deal("X"));
        let p = pipeline(feeds, pages, extractor);

        let (results, stats) = p.run(&[entry("k", "feed-a")], &Job::arms_exports()).await;

        assert!(results.is_empty());
        assert_eq!(stats.short_pages, 1);
        assert_eq!(p.extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let text = "x".repeat(150);
        let feeds = StubFeeds::default().with("feed-a", &["https://a.example"]);
        let pages = StubPages::default().page("https://a.example", &text);
        let extractor = StubExtractor::default().answer("xxx", deal("X"));
        let p = pipeline(feeds, pages, extractor);

        p.run(&[entry("k", "feed-a")], &Job::arms_exports()).await;
        assert_eq!(p.extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_record_without_signals_is_dropped() {
        let feeds = StubFeeds::default().with("feed-a", &["https://news.example/sports"]);
        let pages = StubPages::default().page("https://news.example/sports", &format!("HOCKEY {LONG}"));
        let extractor = StubExtractor::default().answer("HOCKEY", json!({"transaction_type": "", "comments": "n/a"}));
        let p = pipeline(feeds, pages, extractor);

        let (results, stats) = p.run(&[entry("k", "feed-a")], &Job::arms_exports()).await;

        assert!(results.is_empty());
        assert_eq!(stats.rejected, 1);
        assert_eq!(p.extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_filter_off_keeps_sparse_records() {
        let feeds = StubFeeds::default().with("feed-a", &["https://games.example/x"]);
        let pages = StubPages::default().page("https://games.example/x", &format!("GAME {LONG}"));
        let extractor = StubExtractor::default().answer("GAME", json!({"news_description": "patch notes"}));
        let p = pipeline(feeds, pages, extractor);

        let (results, _) = p.run(&[entry("k", "feed-a")], &Job::news_items()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results.groups[0].items[0].record.get_str("game"), Some(""));
    }

    #[tokio::test]
    async fn test_failures_are_skipped_and_run_continues() {
        let feeds = StubFeeds::default().with(
            "feed-a",
            &[
                "https://a.example/down",
                "https://a.example/model-error",
                "https://a.example/good",
            ],
        );
        let pages = StubPages::default()
            .broken("https://a.example/down")
            .page("https://a.example/model-error", &format!("BOOM {LONG}"))
            .page("https://a.example/good", &format!("GOOD {LONG}"));
        let extractor = StubExtractor::default()
            .fail("BOOM", "connection reset")
            .answer("GOOD", deal("Colt Canada"));
        let p = pipeline(feeds, pages, extractor);

        let (results, stats) = p.run(&[entry("k", "feed-a")], &Job::arms_exports()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results.groups[0].items[0].source_url, "https://a.example/good");
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.alerts, 3);
    }

    #[tokio::test]
    async fn test_groups_follow_registry_order_including_empty_feeds() {
        let feeds = StubFeeds::default()
            .with("feed-a", &["https://a.example/1", "https://a.example/2"])
            .with("feed-c", &["https://c.example/1"]);
        let pages = StubPages::default()
            .page("https://a.example/1", &format!("A1 {LONG}"))
            .page("https://a.example/2", &format!("A2 {LONG}"))
            .page("https://c.example/1", &format!("C1 {LONG}"));
        let extractor = StubExtractor::default()
            .answer("A1", deal("one"))
            .answer("A2", deal("two"))
            .answer("C1", deal("three"));
        let p = pipeline(feeds, pages, extractor);

        let registry = [entry("alpha", "feed-a"), entry("beta", "feed-b"), entry("gamma", "feed-c")];
        let (results, stats) = p.run(&registry, &Job::arms_exports()).await;

        let keywords: Vec<&str> = results.groups.iter().map(|g| g.keyword.as_str()).collect();
        assert_eq!(keywords, ["alpha", "beta", "gamma"]);
        assert!(results.groups[1].items.is_empty());
        let companies: Vec<&str> = results
            .rows()
            .filter_map(|row| row.record.get_str("company_division"))
            .collect();
        assert_eq!(companies, ["one", "two", "three"]);
        assert_eq!(stats.feeds, 3);
        assert_eq!(*p.feeds.reads.lock().unwrap(), ["feed-a", "feed-b", "feed-c"]);
    }

    #[tokio::test]
    async fn test_rerun_gives_same_result() {
        let feeds = StubFeeds::default().with("feed-a", &["https://a.example/1", "https://a.example/short"]);
        let pages = StubPages::default()
            .page("https://a.example/1", &format!("A1 {LONG}"))
            .page("https://a.example/short", "tiny");
        let extractor = StubExtractor::default().answer("A1", deal("one"));
        let p = pipeline(feeds, pages, extractor);
        let registry = [entry("k", "feed-a")];

        let first = p.run(&registry, &Job::arms_exports()).await;
        let second = p.run(&registry, &Job::arms_exports()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_job_instructions_reach_extractor() {
        struct Capture(Mutex<Option<String>>);
        impl RecordExtractor for Capture {
            async fn extract(
                &self,
                _text: &str,
                schema: &SchemaDescriptor,
                extra_instructions: Option<&str>,
            ) -> Result<Record, ExtractionError> {
                *self.0.lock().unwrap() = extra_instructions.map(str::to_string);
                schema.validate_value(json!({}))
            }
        }

        let feeds = StubFeeds::default().with("feed-a", &["https://a.example/1"]);
        let pages = StubPages::default().page("https://a.example/1", LONG);
        let p = pipeline(feeds, pages, Capture(Mutex::new(None)));

        p.run(&[entry("k", "feed-a")], &Job::transactions()).await;
        let seen = p.extractor.0.lock().unwrap().clone().unwrap();
        assert!(seen.contains("Canadian government"));
    }

    #[tokio::test]
    async fn test_pacing_delay_after_each_model_call() {
        let feeds = StubFeeds::default().with("feed-a", &["https://a.example/1", "https://a.example/2"]);
        let pages = StubPages::default()
            .page("https://a.example/1", &format!("A1 {LONG}"))
            .page("https://a.example/2", &format!("A2 {LONG}"));
        let extractor = StubExtractor::default()
            .answer("A1", deal("one"))
            .fail("A2", "quota");
        let p = Pipeline::builder(feeds, pages, extractor)
            .request_delay(Duration::from_millis(40))
            .build();

        let before = Instant::now();
        p.run(&[entry("k", "feed-a")], &Job::arms_exports()).await;
        assert!(before.elapsed() >= Duration::from_millis(80));
    }
}
