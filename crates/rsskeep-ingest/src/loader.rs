//! Replays partition files into the database.
//!
//! Every record whose uid is not yet stored for its (source, category) is
//! inserted; source and category come from the file's location.

use rsskeep_core::Partition;
use rsskeep_db::FeedRecord;

use crate::error::StoreError;
use crate::partition::{read_document, PartitionStore, StoredEntry};
use crate::sink::FeedTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Inserted(u64),
    Unreadable(String),
    DbFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub partition: Partition,
    /// Records found in the partition file.
    pub records: usize,
    pub outcome: LoadOutcome,
}

impl LoadReport {
    #[must_use]
    pub fn inserted(&self) -> u64 {
        match self.outcome {
            LoadOutcome::Inserted(n) => n,
            _ => 0,
        }
    }
}

fn to_record(entry: StoredEntry) -> FeedRecord {
    FeedRecord::from_stored(
        entry.uid,
        entry.title,
        entry.link,
        entry.summary,
        entry.published_date,
    )
}

/// Load every partition file under the store's root into `table`, one
/// statement per partition. Unreadable files and failed statements are
/// logged and reported; they do not stop the remaining partitions.
///
/// # Errors
///
/// Returns [`StoreError::Io`] only if the data root itself cannot be listed.
pub async fn replay_partitions<T: FeedTable>(
    store: &PartitionStore,
    table: &T,
) -> Result<Vec<LoadReport>, StoreError> {
    let partitions = store.list_partitions().await?;
    let mut reports = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let path = store.path_for(&partition);
        let document = match read_document(&path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "skipping unreadable partition file");
                reports.push(LoadReport {
                    partition,
                    records: 0,
                    outcome: LoadOutcome::Unreadable(e.to_string()),
                });
                continue;
            }
        };

        let records: Vec<FeedRecord> = document.entries.into_iter().map(to_record).collect();
        let outcome = match table.insert_missing(&partition, &records).await {
            Ok(inserted) => {
                tracing::info!(
                    partition = %partition,
                    records = records.len(),
                    inserted,
                    "partition replayed"
                );
                LoadOutcome::Inserted(inserted)
            }
            Err(e) => {
                tracing::error!(partition = %partition, error = %e, "partition replay failed");
                LoadOutcome::DbFailed(e.to_string())
            }
        };

        reports.push(LoadReport {
            partition,
            records: records.len(),
            outcome,
        });
    }

    Ok(reports)
}
