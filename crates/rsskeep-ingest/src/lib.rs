//! Incremental feed ingestion: partition files as the dedup store, a file
//! and database sink, and the scheduler that drives passes over the source
//! registry.

pub mod backfill;
pub mod error;
pub mod loader;
pub mod partition;
pub mod pass;
pub mod scheduler;
pub mod sink;

pub use backfill::{backfill_gmt, BackfillReport};
pub use error::{SinkError, StoreError};
pub use loader::{replay_partitions, LoadOutcome, LoadReport};
pub use partition::{read_document, PartitionDocument, PartitionState, PartitionStore, StoredEntry};
pub use pass::{run_pass, FetchFeed, PassOptions, PassReport, SourceOutcome, SourceReport};
pub use scheduler::{Connector, PgConnector, RunSummary, Scheduler, SchedulerConfig};
pub use sink::{apply_entries, FeedTable, SinkOutcome};
