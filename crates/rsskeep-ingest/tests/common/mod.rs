//! In-memory doubles for the fetch and database seams.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rsskeep_core::{Entry, FeedSource, Partition, SourceRegistry};
use rsskeep_db::{DbError, FeedRecord};
use rsskeep_feeds::FetchError;
use rsskeep_ingest::{Connector, FeedTable, FetchFeed, PassOptions};

pub fn entry(id: &str, title: &str) -> Entry {
    Entry {
        id: id.to_string(),
        title: title.to_string(),
        link: format!("https://example.com/{id}"),
        summary: String::new(),
        published: "Fri, 01 Mar 2024 10:00:00 GMT".to_string(),
        published_utc: None,
    }
}

pub fn feed(url: &str, source: &str, category: &str) -> FeedSource {
    FeedSource {
        url: url.to_string(),
        source: source.to_string(),
        category: category.to_string(),
    }
}

pub fn registry(sources: Vec<FeedSource>) -> SourceRegistry {
    SourceRegistry {
        sources,
        content_filters: std::collections::BTreeMap::new(),
    }
}

pub fn no_delays() -> PassOptions {
    PassOptions {
        fetch_concurrency: 1,
        fetch_failure_delay: Duration::ZERO,
        partition_pause: Duration::ZERO,
    }
}

/// RSS 2.0 body with one `<item>` per `(guid, title)` pair.
pub fn rss(items: &[(&str, &str)]) -> String {
    let mut body = String::from("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>Test</title>");
    for (guid, title) in items {
        body.push_str(&format!(
            "<item><guid>{guid}</guid><title>{title}</title><link>https://example.com/{guid}</link>\
             <pubDate>Fri, 01 Mar 2024 10:00:00 GMT</pubDate></item>"
        ));
    }
    body.push_str("</channel></rss>");
    body
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub partition: Partition,
    pub record: FeedRecord,
}

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<StoredRow>,
    insert_calls: usize,
    bulk_calls: usize,
    replay_calls: usize,
    failing_uids: HashSet<String>,
    fail_bulk: bool,
}

/// Records every write; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct StubTable {
    state: Arc<Mutex<TableState>>,
}

impl StubTable {
    pub fn failing_on(uids: &[&str]) -> Self {
        let table = Self::default();
        table.state.lock().unwrap().failing_uids = uids.iter().map(|u| (*u).to_string()).collect();
        table
    }

    pub fn failing_bulk() -> Self {
        let table = Self::default();
        table.state.lock().unwrap().fail_bulk = true;
        table
    }

    pub fn rows(&self) -> Vec<StoredRow> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn uids(&self) -> Vec<String> {
        self.rows().into_iter().map(|r| r.record.uid).collect()
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    pub fn bulk_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_calls
    }

    pub fn replay_calls(&self) -> usize {
        self.state.lock().unwrap().replay_calls
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.insert_calls + state.bulk_calls + state.replay_calls
    }
}

fn simulated_failure() -> DbError {
    DbError::Sqlx(sqlx::Error::Protocol("simulated failure".to_string()))
}

impl FeedTable for StubTable {
    async fn insert_entry(&self, partition: &Partition, entry: &Entry) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        if state.failing_uids.contains(&entry.id) {
            return Err(simulated_failure());
        }
        state.rows.push(StoredRow {
            partition: partition.clone(),
            record: FeedRecord::from_entry(entry),
        });
        Ok(())
    }

    async fn bulk_load(&self, partition: &Partition, entries: &[Entry]) -> Result<u64, DbError> {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls += 1;
        if state.fail_bulk {
            return Err(simulated_failure());
        }
        for entry in entries {
            state.rows.push(StoredRow {
                partition: partition.clone(),
                record: FeedRecord::from_entry(entry),
            });
        }
        Ok(entries.len() as u64)
    }

    async fn insert_missing(
        &self,
        partition: &Partition,
        records: &[FeedRecord],
    ) -> Result<u64, DbError> {
        let mut state = self.state.lock().unwrap();
        state.replay_calls += 1;
        let mut inserted = 0;
        for record in records {
            let present = state
                .rows
                .iter()
                .any(|row| &row.partition == partition && row.record.uid == record.uid);
            if !present {
                state.rows.push(StoredRow {
                    partition: partition.clone(),
                    record: record.clone(),
                });
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Serves canned bodies by URL; unknown URLs answer HTTP 404.
#[derive(Debug, Default)]
pub struct StubFetcher {
    bodies: HashMap<String, Result<String, u16>>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<String>) -> Self {
        self.bodies.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.bodies.insert(url.to_string(), Err(status));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl FetchFeed for StubFetcher {
    async fn fetch(&self, feed: &FeedSource) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(feed.url.clone());
        match self.bodies.get(&feed.url) {
            Some(Ok(body)) => Ok(body.clone().into_bytes()),
            Some(Err(status)) => Err(FetchError::Status {
                feed: feed.source.clone(),
                category: feed.category.clone(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                feed: feed.source.clone(),
                category: feed.category.clone(),
                status: 404,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Fails the first `failures` connects, then hands out clones of one table.
#[derive(Debug, Default)]
pub struct StubConnector {
    pub table: StubTable,
    failures: usize,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl StubConnector {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Connector for StubConnector {
    type Table = StubTable;

    async fn connect(&self) -> Result<StubTable, DbError> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(self.table.clone())
    }

    async fn close(&self, _table: StubTable) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
