//! Command handlers, called from `main` once config and logging are set up.

use rsskeep_core::{load_sources, AppConfig, Partition};
use rsskeep_db::DbError;
use rsskeep_feeds::{ContentFilters, FeedFetcher};
use rsskeep_ingest::{PartitionStore, PgConnector, Scheduler, SchedulerConfig};

/// Scheduler settings for `run`, with CLI overrides applied.
pub(crate) fn scheduler_config(config: &AppConfig, days: Option<f64>, once: bool) -> SchedulerConfig {
    let mut scheduler = SchedulerConfig::from_app_config(config);
    if let Some(days) = days {
        scheduler.run_for = rsskeep_core::app_config::days_to_duration(days);
    }
    if once {
        scheduler.max_passes = Some(1);
    }
    scheduler
}

/// Run the ingestion scheduler.
///
/// # Errors
///
/// Returns an error if the source registry cannot be loaded, the HTTP client
/// cannot be built, or the database sink is enabled without `DATABASE_URL`.
/// Failures during the run itself are logged, not returned.
pub(crate) async fn run_ingest(
    config: &AppConfig,
    days: Option<f64>,
    no_db: bool,
    once: bool,
) -> anyhow::Result<()> {
    if let Some(days) = days {
        anyhow::ensure!(
            days.is_finite() && days >= 0.0,
            "--days must be a non-negative number, got {days}"
        );
    }

    let registry = load_sources(&config.sources_path)?;
    let filters = ContentFilters::with_overrides(&registry.content_filters);
    let fetcher = FeedFetcher::new(config.fetch_timeout_secs, &config.user_agent, filters)?;
    let store = PartitionStore::new(&config.data_root);
    let connector = if no_db {
        None
    } else {
        Some(PgConnector::from_app_config(config)?)
    };

    let scheduler = Scheduler::new(
        &registry,
        fetcher,
        store,
        connector,
        scheduler_config(config, days, once),
    );
    let summary = scheduler.run().await;

    println!(
        "passes: {}  new entries: {}  db failures: {}  failed sources: {}  connect failures: {}",
        summary.passes,
        summary.new_entries,
        summary.db_failed,
        summary.failed_sources,
        summary.connect_failures
    );
    Ok(())
}

/// Replay every partition file into `rss_feeds`.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the data root cannot be listed.
pub(crate) async fn run_load(config: &AppConfig) -> anyhow::Result<()> {
    let pool = rsskeep_db::connect_pool_from_config(config).await?;
    let store = PartitionStore::new(&config.data_root);

    let reports = rsskeep_ingest::replay_partitions(&store, &pool).await?;
    pool.close().await;

    let mut inserted = 0;
    for report in &reports {
        inserted += report.inserted();
        println!(
            "{:<40} records: {:>6}  {:?}",
            report.partition.to_string(),
            report.records,
            report.outcome
        );
    }
    println!("partitions: {}  inserted: {inserted}", reports.len());
    Ok(())
}

/// Fill in missing `gmt_date` values.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the rows cannot be listed.
pub(crate) async fn run_backfill(config: &AppConfig) -> anyhow::Result<()> {
    let pool = rsskeep_db::connect_pool_from_config(config).await?;
    let report = rsskeep_ingest::backfill_gmt(&pool).await?;
    pool.close().await;

    println!("scanned: {}  updated: {}", report.scanned, report.updated);
    Ok(())
}

/// Print each configured source with its partition file and record count.
///
/// When `DATABASE_URL` is set, the stored row count for each partition is
/// shown too; an unreachable database is logged and the column left blank.
///
/// # Errors
///
/// Returns an error if the source registry cannot be loaded.
pub(crate) async fn list_sources(config: &AppConfig) -> anyhow::Result<()> {
    let registry = load_sources(&config.sources_path)?;
    let store = PartitionStore::new(&config.data_root);

    let pool = if config.database_url.is_some() {
        match rsskeep_db::connect_pool_from_config(config).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "database unavailable; row counts skipped");
                None
            }
        }
    } else {
        None
    };

    for feed in &registry.sources {
        let partition = feed.partition();
        let records = match store.record_count(&partition).await {
            Ok(Some(count)) => count.to_string(),
            Ok(None) => "-".to_string(),
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "cannot read partition file");
                "unreadable".to_string()
            }
        };
        let rows = match &pool {
            Some(pool) => Some(rsskeep_db::count_feed_rows(pool, &partition).await),
            None => None,
        };
        println!(
            "{:<16} {:<12} {:>10} {:>10}  {}  {}",
            feed.source,
            feed.category,
            records,
            row_count_cell(&partition, rows),
            store.path_for(&partition).display(),
            feed.url
        );
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(())
}

/// Render the database row count column of `sources`.
pub(crate) fn row_count_cell(
    partition: &Partition,
    rows: Option<Result<i64, DbError>>,
) -> String {
    match rows {
        None => "-".to_string(),
        Some(Ok(count)) => count.to_string(),
        Some(Err(e)) => {
            tracing::warn!(partition = %partition, error = %e, "row count failed");
            "error".to_string()
        }
    }
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub(crate) async fn run_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = rsskeep_db::connect_pool_from_config(config).await?;
    let applied = rsskeep_db::run_migrations(&pool).await?;
    pool.close().await;

    println!("applied {applied} migration(s)");
    Ok(())
}
