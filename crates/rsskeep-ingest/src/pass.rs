//! One ingestion pass over the source registry.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rsskeep_core::{FeedSource, SourceRegistry};
use rsskeep_feeds::{parse_feed, FeedFetcher, FetchError, ParsedFeed};

use crate::partition::PartitionStore;
use crate::sink::{apply_entries, FeedTable};

/// Source of raw feed bodies. Implemented for [`FeedFetcher`].
pub trait FetchFeed {
    fn fetch(&self, feed: &FeedSource) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

impl<F: FetchFeed> FetchFeed for &F {
    fn fetch(&self, feed: &FeedSource) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        (**self).fetch(feed)
    }
}

impl FetchFeed for FeedFetcher {
    async fn fetch(&self, feed: &FeedSource) -> Result<Vec<u8>, FetchError> {
        FeedFetcher::fetch(self, feed).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Stored,
    FetchFailed(String),
    ParseFailed(String),
    FileFailed(String),
}

impl SourceOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, SourceOutcome::Stored)
    }
}

/// Per-source result of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub category: String,
    pub url: String,
    /// Entries the parser produced.
    pub fetched: usize,
    /// Items the parser dropped.
    pub rejected: usize,
    pub new: usize,
    pub db_failed: usize,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    fn new(feed: &FeedSource, outcome: SourceOutcome) -> Self {
        Self {
            source: feed.source.clone(),
            category: feed.category.clone(),
            url: feed.url.clone(),
            fetched: 0,
            rejected: 0,
            new: 0,
            db_failed: 0,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub sources: Vec<SourceReport>,
}

impl PassReport {
    #[must_use]
    pub fn new_entries(&self) -> usize {
        self.sources.iter().map(|s| s.new).sum()
    }

    #[must_use]
    pub fn db_failed(&self) -> usize {
        self.sources.iter().map(|s| s.db_failed).sum()
    }

    #[must_use]
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.outcome.is_failure()).count()
    }
}

/// Knobs for a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    /// Sources fetched and parsed ahead of the sequential sink loop.
    pub fetch_concurrency: usize,
    /// Pause after a source whose fetch failed.
    pub fetch_failure_delay: Duration,
    /// Pause after every partition file write.
    pub partition_pause: Duration,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            fetch_concurrency: 1,
            fetch_failure_delay: Duration::from_secs(5),
            partition_pause: Duration::from_millis(500),
        }
    }
}

enum Fetched {
    Parsed(ParsedFeed),
    FetchFailed(FetchError),
    ParseFailed(String),
}

async fn fetch_and_parse<F: FetchFeed>(fetcher: &F, feed: &FeedSource) -> Fetched {
    match fetcher.fetch(feed).await {
        Ok(body) => match parse_feed(&body, Utc::now()) {
            Ok(parsed) => Fetched::Parsed(parsed),
            Err(e) => Fetched::ParseFailed(e.to_string()),
        },
        Err(e) => Fetched::FetchFailed(e),
    }
}

/// Run Fetch → Parse → Dedup → Sink for every source, in registry order.
///
/// Failures are isolated to their source and recorded in the report. Fetching
/// may run ahead by `fetch_concurrency` sources; partition updates are applied
/// strictly one at a time.
pub async fn run_pass<F, T>(
    registry: &SourceRegistry,
    fetcher: &F,
    store: &PartitionStore,
    table: Option<&T>,
    options: &PassOptions,
) -> PassReport
where
    F: FetchFeed,
    T: FeedTable,
{
    let mut report = PassReport::default();

    let mut fetched = pin!(stream::iter(registry.sources.iter())
        .map(|feed| async move { (feed, fetch_and_parse(fetcher, feed).await) })
        .buffered(options.fetch_concurrency.max(1)));

    while let Some((feed, result)) = fetched.next().await {
        let partition = feed.partition();

        let parsed = match result {
            Fetched::Parsed(parsed) => parsed,
            Fetched::FetchFailed(e) => {
                tracing::warn!(
                    source = %feed.source,
                    category = %feed.category,
                    url = %feed.url,
                    error = %e,
                    "feed fetch failed; skipping source this pass"
                );
                report
                    .sources
                    .push(SourceReport::new(feed, SourceOutcome::FetchFailed(e.to_string())));
                tokio::time::sleep(options.fetch_failure_delay).await;
                continue;
            }
            Fetched::ParseFailed(message) => {
                tracing::warn!(
                    source = %feed.source,
                    category = %feed.category,
                    url = %feed.url,
                    error = %message,
                    "feed parse failed; skipping source this pass"
                );
                report
                    .sources
                    .push(SourceReport::new(feed, SourceOutcome::ParseFailed(message)));
                continue;
            }
        };

        for rejected in &parsed.rejected {
            tracing::warn!(
                source = %feed.source,
                category = %feed.category,
                index = rejected.index,
                hint = rejected.hint.as_deref().unwrap_or(""),
                reason = %rejected.reason,
                "dropping feed item"
            );
        }

        let mut source_report = SourceReport::new(feed, SourceOutcome::Stored);
        source_report.fetched = parsed.entries.len();
        source_report.rejected = parsed.rejected.len();

        match apply_entries(store, &partition, parsed.entries, table).await {
            Ok(outcome) => {
                source_report.new = outcome.accepted;
                source_report.db_failed = outcome.db_failed;
                tracing::info!(
                    source = %feed.source,
                    category = %feed.category,
                    fetched = source_report.fetched,
                    new = outcome.accepted,
                    db_failed = outcome.db_failed,
                    first_run = outcome.first_run,
                    "source processed"
                );
                if outcome.file_written {
                    tokio::time::sleep(options.partition_pause).await;
                }
            }
            Err(e) => {
                tracing::error!(
                    source = %feed.source,
                    category = %feed.category,
                    error = %e,
                    "partition update failed; skipping source this pass"
                );
                source_report.outcome = SourceOutcome::FileFailed(e.to_string());
            }
        }

        report.sources.push(source_report);
    }

    report
}
