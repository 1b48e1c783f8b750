//! # Alert Extract
//!
//! Reads keyword news-alert feeds, fetches the article each alert points
//! to, and asks a language model to pull a schema-shaped record out of the
//! page text. Records are grouped by keyword and written to a JSON file,
//! posted to an ingestion endpoint, or printed.
//!
//! ## Usage
//!
//! ```sh
//! GOOGLE_API_KEY=... alert_extract --feeds feeds.json --job arms-exports
//! ```
//!
//! ## Architecture
//!
//! 1. **Registry**: load the keyword → feed URL map
//! 2. **Feeds**: read each feed, unwrap the redirector links
//! 3. **Fetching**: render each destination page and keep its visible text
//! 4. **Extraction**: one schema-constrained model call per page, paced
//! 5. **Output**: deliver the grouped records to the configured sink
//!
//! Everything runs sequentially. Only startup problems stop a run.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod extract;
mod feeds;
mod fetch;
mod jobs;
mod models;
mod outputs;
mod pipeline;
#[cfg(test)]
mod testing;
mod utils;

use api::GeminiClient;
use cli::Cli;
use config::{ApiKey, RendererKind, Settings};
use error::ConfigError;
use extract::Extractor;
use feeds::{FeedReader, load_feeds};
use fetch::{ContentFetcher, HttpRenderer, PlaywrightRenderer, Renderer};
use jobs::Job;
use models::{FeedEntry, ResultSet, RunStats};
use outputs::Sink;
use pipeline::Pipeline;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("alert_extract starting up");

    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env");
    }

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.feeds, ?args.config, job = %args.job, "Parsed CLI arguments");

    // ---- Settings, credential, registry, job ----
    let Startup {
        settings,
        api_key,
        feeds,
        job,
        sink,
    } = match prepare(&args) {
        Ok(startup) => startup,
        Err(e @ ConfigError::MissingCredential(_)) => {
            error!(error = %e, "Model API key missing; set it in the environment or a .env file");
            return Err(e.into());
        }
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        job = %job.name,
        schema = %job.schema.name,
        feeds = feeds.len(),
        model = %settings.model,
        "Configuration loaded"
    );

    // Early check: file output must be writable before any network traffic
    if let Sink::File(file_sink) = &sink {
        if let Err(e) = ensure_writable_dir(file_sink.output_dir()).await {
            error!(
                path = %file_sink.output_dir(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Run ----
    let reader = FeedReader::new(&settings)?;
    let extractor = Extractor::new(GeminiClient::new(&settings, api_key)?);
    let (results, stats) = match settings.renderer {
        RendererKind::Http => {
            let renderer = HttpRenderer::new(&settings)?;
            run_with(renderer, reader, extractor, &settings, &feeds, &job).await
        }
        RendererKind::Playwright => {
            let renderer = PlaywrightRenderer::new(&settings);
            run_with(renderer, reader, extractor, &settings, &feeds, &job).await
        }
    };

    info!(
        feeds = stats.feeds,
        alerts = stats.alerts,
        fetch_failures = stats.fetch_failures,
        short_pages = stats.short_pages,
        extraction_failures = stats.extraction_failures,
        rejected = stats.rejected,
        collected = stats.collected,
        "Run statistics"
    );

    // ---- Delivery ----
    let report = match sink.deliver(&results).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Failed to deliver results");
            return Err(e.into());
        }
    };
    if report.failed > 0 {
        warn!(failed = report.failed, destination = %report.destination, "Some records were not delivered");
    }
    if report.delivered > 0 {
        info!(
            records = report.delivered,
            destination = %report.destination,
            "{} records delivered",
            report.delivered
        );
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        "Execution time: {:.2?}", elapsed
    );

    Ok(())
}

/// Everything a run needs before it touches the network.
struct Startup {
    settings: Settings,
    api_key: ApiKey,
    feeds: Vec<FeedEntry>,
    job: Job,
    sink: Sink,
}

/// Resolve settings, credential, registry, job and sink. Performs no
/// network I/O; the credential is checked before the registry is read.
fn prepare(args: &Cli) -> Result<Startup, ConfigError> {
    let settings = Settings::load(args.config.as_deref())?.with_overrides(args);
    settings.validate()?;
    let api_key = ApiKey::from_env(&settings.api_key_env)?;
    let feeds = load_feeds(&args.feeds)?;
    let job = Job::resolve(&args.job, &settings)?;
    let sink = Sink::from_settings(&settings, &job.name)?;
    Ok(Startup {
        settings,
        api_key,
        feeds,
        job,
        sink,
    })
}

/// Assemble the pipeline around a concrete renderer and run it.
async fn run_with<R: Renderer>(
    renderer: R,
    reader: FeedReader,
    extractor: Extractor<GeminiClient>,
    settings: &Settings,
    feeds: &[FeedEntry],
    job: &Job,
) -> (ResultSet, RunStats) {
    let fetcher = ContentFetcher::new(renderer, Duration::from_secs(settings.fetch_timeout_secs));
    let pipeline = Pipeline::builder(reader, fetcher, extractor)
        .settings(settings)
        .build();
    pipeline.run(feeds, job).await
}
