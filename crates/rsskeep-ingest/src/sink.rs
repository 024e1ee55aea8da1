//! Applies a batch of parsed entries to one partition: dedup, then the file
//! sink, then the database sink.

use std::future::Future;

use rsskeep_core::{Entry, Partition};
use rsskeep_db::{DbError, FeedRecord};
use sqlx::PgPool;

use crate::error::SinkError;
use crate::partition::PartitionStore;

/// Database side of the sink. Implemented for [`PgPool`]; tests substitute
/// an in-memory table.
pub trait FeedTable {
    /// Insert one accepted entry, committed on its own.
    fn insert_entry(
        &self,
        partition: &Partition,
        entry: &Entry,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Insert a first-run batch in a single statement tagged with `partition`.
    fn bulk_load(
        &self,
        partition: &Partition,
        entries: &[Entry],
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    /// Insert stored records whose uid is not yet present for `partition`.
    fn insert_missing(
        &self,
        partition: &Partition,
        records: &[FeedRecord],
    ) -> impl Future<Output = Result<u64, DbError>> + Send;
}

impl FeedTable for PgPool {
    async fn insert_entry(&self, partition: &Partition, entry: &Entry) -> Result<(), DbError> {
        rsskeep_db::insert_feed_record(self, partition, &FeedRecord::from_entry(entry)).await
    }

    async fn bulk_load(&self, partition: &Partition, entries: &[Entry]) -> Result<u64, DbError> {
        let records: Vec<FeedRecord> = entries.iter().map(FeedRecord::from_entry).collect();
        rsskeep_db::bulk_insert_feed_records(self, partition, &records).await
    }

    async fn insert_missing(
        &self,
        partition: &Partition,
        records: &[FeedRecord],
    ) -> Result<u64, DbError> {
        rsskeep_db::insert_missing_feed_records(self, partition, records).await
    }
}

/// What happened to one batch of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkOutcome {
    /// Entries offered to the dedup filter.
    pub offered: usize,
    /// Entries that passed dedup and are now in the partition file.
    pub accepted: usize,
    pub db_inserted: usize,
    pub db_failed: usize,
    /// The partition had no file before this batch.
    pub first_run: bool,
    pub file_written: bool,
}

/// Dedup `entries` against `partition` and write the survivors to both sinks.
///
/// The file is rewritten when anything was accepted, or when the partition had
/// no file yet. Database writes only happen after a successful file write.
/// On a first run all accepted entries go to the table in one bulk load;
/// otherwise each is inserted individually and a failed insert does not stop
/// the rest.
///
/// # Errors
///
/// Returns [`SinkError::File`] if the partition file cannot be loaded or
/// rewritten. Database failures are logged and counted, never returned.
pub async fn apply_entries<T: FeedTable>(
    store: &PartitionStore,
    partition: &Partition,
    entries: Vec<Entry>,
    table: Option<&T>,
) -> Result<SinkOutcome, SinkError> {
    let mut state = store.load(partition).await?;
    let mut outcome = SinkOutcome {
        offered: entries.len(),
        first_run: !state.existed(),
        ..SinkOutcome::default()
    };

    let mut accepted = Vec::new();
    for entry in entries {
        if state.is_new(&entry) {
            state.accept(&entry);
            tracing::debug!(
                partition = %partition,
                uid = %entry.id,
                title = %entry.title,
                "new entry"
            );
            accepted.push(entry);
        }
    }
    outcome.accepted = accepted.len();

    if !accepted.is_empty() || outcome.first_run {
        store.save(partition, &state).await?;
        outcome.file_written = true;
    }

    let Some(table) = table else {
        return Ok(outcome);
    };
    if accepted.is_empty() {
        return Ok(outcome);
    }

    if outcome.first_run {
        match table.bulk_load(partition, &accepted).await {
            Ok(_) => outcome.db_inserted = accepted.len(),
            Err(e) => {
                tracing::error!(
                    partition = %partition,
                    entries = accepted.len(),
                    error = %e,
                    "bulk load failed"
                );
                outcome.db_failed = accepted.len();
            }
        }
    } else {
        for entry in &accepted {
            match table.insert_entry(partition, entry).await {
                Ok(()) => outcome.db_inserted += 1,
                Err(e) => {
                    tracing::warn!(
                        partition = %partition,
                        uid = %entry.id,
                        error = %e,
                        "database insert failed"
                    );
                    outcome.db_failed += 1;
                }
            }
        }
    }

    Ok(outcome)
}
