//! The long-running ingestion loop.
//!
//! ```text
//! INIT → CYCLE_TOP ─┬─ window elapsed / pass limit ──────────────→ DONE
//!                   ├─ database disabled ─→ ITERATE_SOURCES → SLEEP → CYCLE_TOP
//!                   └─ CONNECT_DB ─┬─ ok ─→ ITERATE_SOURCES → SLEEP → CYCLE_TOP
//!                                  └─ err → SLEEP(reconnect) ─────→ CYCLE_TOP
//! ```

use std::future::Future;
use std::time::Duration;

use rsskeep_core::{AppConfig, SourceRegistry};
use rsskeep_db::{DbError, PoolConfig};
use sqlx::PgPool;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::partition::PartitionStore;
use crate::pass::{run_pass, FetchFeed, PassOptions, PassReport};
use crate::sink::FeedTable;

/// Opens and closes the per-cycle database session.
pub trait Connector {
    type Table: FeedTable;

    fn connect(&self) -> impl Future<Output = Result<Self::Table, DbError>> + Send;

    fn close(&self, table: Self::Table) -> impl Future<Output = ()> + Send;
}

impl<C: Connector> Connector for &C {
    type Table = C::Table;

    fn connect(&self) -> impl Future<Output = Result<Self::Table, DbError>> + Send {
        (**self).connect()
    }

    fn close(&self, table: Self::Table) -> impl Future<Output = ()> + Send {
        (**self).close(table)
    }
}

/// Opens a fresh [`PgPool`] per cycle and closes it after the pass.
#[derive(Clone)]
pub struct PgConnector {
    database_url: String,
    pool_config: PoolConfig,
}

impl PgConnector {
    #[must_use]
    pub fn new(database_url: impl Into<String>, pool_config: PoolConfig) -> Self {
        Self {
            database_url: database_url.into(),
            pool_config,
        }
    }

    /// # Errors
    ///
    /// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is not configured.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, DbError> {
        let database_url = config
            .database_url
            .clone()
            .ok_or(DbError::MissingDatabaseUrl)?;
        Ok(Self::new(database_url, PoolConfig::from_app_config(config)))
    }
}

impl std::fmt::Debug for PgConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnector")
            .field("database_url", &"[redacted]")
            .field("pool_config", &self.pool_config)
            .finish()
    }
}

impl Connector for PgConnector {
    type Table = PgPool;

    async fn connect(&self) -> Result<PgPool, DbError> {
        let pool = rsskeep_db::connect_pool(&self.database_url, self.pool_config).await?;
        rsskeep_db::ping(&pool).await?;
        Ok(pool)
    }

    async fn close(&self, table: PgPool) {
        table.close().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Total run window; no new pass starts once it has elapsed.
    pub run_for: Duration,
    pub cycle_delay: Duration,
    pub reconnect_delay: Duration,
    pub pass: PassOptions,
    /// Stop after this many completed passes.
    pub max_passes: Option<usize>,
}

impl SchedulerConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            run_for: config.run_duration(),
            cycle_delay: Duration::from_secs(config.cycle_delay_secs),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            pass: PassOptions {
                fetch_concurrency: config.fetch_concurrency,
                fetch_failure_delay: Duration::from_secs(config.fetch_retry_delay_secs),
                partition_pause: Duration::from_millis(config.partition_pause_ms),
            },
            max_passes: None,
        }
    }
}

/// Totals for a whole scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: usize,
    pub connect_failures: usize,
    pub new_entries: usize,
    pub db_failed: usize,
    pub failed_sources: usize,
}

impl RunSummary {
    fn record(&mut self, report: &PassReport) {
        self.passes += 1;
        self.new_entries += report.new_entries();
        self.db_failed += report.db_failed();
        self.failed_sources += report.failed_sources();
    }
}

enum State<T> {
    Init,
    CycleTop,
    ConnectDb,
    IterateSources(Option<T>),
    Sleep(Duration),
    Done,
}

pub struct Scheduler<'a, F, C> {
    registry: &'a SourceRegistry,
    fetcher: F,
    store: PartitionStore,
    connector: Option<C>,
    config: SchedulerConfig,
}

impl<'a, F, C> Scheduler<'a, F, C>
where
    F: FetchFeed,
    C: Connector,
{
    /// `connector` is `None` when the database sink is disabled.
    #[must_use]
    pub fn new(
        registry: &'a SourceRegistry,
        fetcher: F,
        store: PartitionStore,
        connector: Option<C>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            store,
            connector,
            config,
        }
    }

    /// Drive the state machine until the run window elapses or the pass limit
    /// is reached.
    pub async fn run(&self) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest_run", %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut state = State::Init;

        loop {
            state = match state {
                State::Init => {
                    tracing::info!(
                        sources = self.registry.sources.len(),
                        run_for_secs = self.config.run_for.as_secs_f64(),
                        database = self.connector.is_some(),
                        data_root = %self.store.root().display(),
                        "ingestion run starting"
                    );
                    State::CycleTop
                }
                State::CycleTop => {
                    if self.finished(started, &summary) {
                        State::Done
                    } else if self.connector.is_some() {
                        State::ConnectDb
                    } else {
                        State::IterateSources(None)
                    }
                }
                State::ConnectDb => match &self.connector {
                    Some(connector) => match connector.connect().await {
                        Ok(table) => State::IterateSources(Some(table)),
                        Err(e) => {
                            summary.connect_failures += 1;
                            tracing::error!(
                                error = %e,
                                retry_in_secs = self.config.reconnect_delay.as_secs_f64(),
                                "database connection failed"
                            );
                            State::Sleep(self.config.reconnect_delay)
                        }
                    },
                    None => State::IterateSources(None),
                },
                State::IterateSources(table) => {
                    let report = run_pass(
                        self.registry,
                        &self.fetcher,
                        &self.store,
                        table.as_ref(),
                        &self.config.pass,
                    )
                    .await;

                    if let (Some(connector), Some(table)) = (&self.connector, table) {
                        connector.close(table).await;
                    }

                    summary.record(&report);
                    tracing::info!(
                        pass = summary.passes,
                        sources = report.sources.len(),
                        new = report.new_entries(),
                        db_failed = report.db_failed(),
                        failed_sources = report.failed_sources(),
                        "pass complete"
                    );

                    if self.finished(started, &summary) {
                        State::Done
                    } else {
                        State::Sleep(self.config.cycle_delay)
                    }
                }
                State::Sleep(delay) => {
                    tokio::time::sleep(delay).await;
                    State::CycleTop
                }
                State::Done => break,
            };
        }

        tracing::info!(
            passes = summary.passes,
            connect_failures = summary.connect_failures,
            new = summary.new_entries,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ingestion run finished"
        );
        summary
    }

    fn finished(&self, started: Instant, summary: &RunSummary) -> bool {
        started.elapsed() >= self.config.run_for
            || self
                .config
                .max_passes
                .is_some_and(|max| summary.passes >= max)
    }
}
