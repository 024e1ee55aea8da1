//! Database operations for the `rss_feeds` table.
//!
//! Every write lists its columns in the same order:
//! `(uid, title, link, summary, published_date, gmt_date, category, source)`.
//! `gmt_date` travels as its `YYYY-MM-DD HH:MM:SS` rendering and is cast in
//! SQL, so an empty rendering is stored as `NULL`.

use chrono::NaiveDateTime;
use rsskeep_core::{parse_feed_timestamp, render_gmt, Entry, Partition};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

pub(crate) const INSERT_FEED_RECORD_SQL: &str = "INSERT INTO rss_feeds \
         (uid, title, link, summary, published_date, gmt_date, category, source) \
     VALUES ($1, $2, $3, $4, $5, CAST(NULLIF($6, '') AS TIMESTAMP), $7, $8)";

pub(crate) const BULK_INSERT_FEED_RECORDS_SQL: &str = "INSERT INTO rss_feeds \
         (uid, title, link, summary, published_date, gmt_date, category, source) \
     SELECT t.uid, t.title, t.link, t.summary, t.published_date, \
            CAST(NULLIF(t.gmt_date, '') AS TIMESTAMP), $7, $8 \
     FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[]) \
         AS t(uid, title, link, summary, published_date, gmt_date)";

pub(crate) const INSERT_MISSING_FEED_RECORDS_SQL: &str = "INSERT INTO rss_feeds \
         (uid, title, link, summary, published_date, gmt_date, category, source) \
     SELECT t.uid, t.title, t.link, t.summary, t.published_date, \
            CAST(NULLIF(t.gmt_date, '') AS TIMESTAMP), $7, $8 \
     FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[]) \
         AS t(uid, title, link, summary, published_date, gmt_date) \
     WHERE NOT EXISTS ( \
         SELECT 1 FROM rss_feeds f \
         WHERE f.uid = t.uid AND f.category = $7 AND f.source = $8)";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// The values written for one entry, minus the partition columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    pub uid: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_date: String,
    /// `YYYY-MM-DD HH:MM:SS`, or empty when the timestamp is unknown.
    pub gmt_date: String,
}

impl FeedRecord {
    #[must_use]
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            uid: entry.id.clone(),
            title: entry.title.clone(),
            link: entry.link.clone(),
            summary: entry.summary.clone(),
            published_date: entry.published.clone(),
            gmt_date: entry.gmt_date(),
        }
    }

    /// Build a record from stored text, deriving `gmt_date` from `published_date`.
    #[must_use]
    pub fn from_stored(
        uid: String,
        title: String,
        link: String,
        summary: String,
        published_date: String,
    ) -> Self {
        let gmt_date = parse_feed_timestamp(&published_date)
            .map(render_gmt)
            .unwrap_or_default();
        Self {
            uid,
            title,
            link,
            summary,
            published_date,
            gmt_date,
        }
    }
}

/// A row still waiting for its `gmt_date`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MissingGmtRow {
    pub id: i64,
    pub published_date: Option<String>,
}

/// Parallel column vectors for `UNNEST` binding.
struct RecordColumns {
    uids: Vec<String>,
    titles: Vec<String>,
    links: Vec<String>,
    summaries: Vec<String>,
    published_dates: Vec<String>,
    gmt_dates: Vec<String>,
}

impl RecordColumns {
    fn from_records(records: &[FeedRecord]) -> Self {
        let mut columns = Self {
            uids: Vec::with_capacity(records.len()),
            titles: Vec::with_capacity(records.len()),
            links: Vec::with_capacity(records.len()),
            summaries: Vec::with_capacity(records.len()),
            published_dates: Vec::with_capacity(records.len()),
            gmt_dates: Vec::with_capacity(records.len()),
        };
        for record in records {
            columns.uids.push(record.uid.clone());
            columns.titles.push(record.title.clone());
            columns.links.push(record.link.clone());
            columns.summaries.push(record.summary.clone());
            columns.published_dates.push(record.published_date.clone());
            columns.gmt_dates.push(record.gmt_date.clone());
        }
        columns
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Insert a single record, committed on its own.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_feed_record(
    pool: &PgPool,
    partition: &Partition,
    record: &FeedRecord,
) -> Result<(), DbError> {
    sqlx::query(INSERT_FEED_RECORD_SQL)
        .bind(&record.uid)
        .bind(&record.title)
        .bind(&record.link)
        .bind(&record.summary)
        .bind(&record.published_date)
        .bind(&record.gmt_date)
        .bind(&partition.category)
        .bind(&partition.source)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert every record in one multi-row statement tagged with `partition`.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails; nothing is inserted then.
pub async fn bulk_insert_feed_records(
    pool: &PgPool,
    partition: &Partition,
    records: &[FeedRecord],
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }
    execute_unnest(pool, BULK_INSERT_FEED_RECORDS_SQL, partition, records).await
}

/// Insert the records whose uid is not yet stored for `partition`.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn insert_missing_feed_records(
    pool: &PgPool,
    partition: &Partition,
    records: &[FeedRecord],
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }
    execute_unnest(pool, INSERT_MISSING_FEED_RECORDS_SQL, partition, records).await
}

async fn execute_unnest(
    pool: &PgPool,
    sql: &'static str,
    partition: &Partition,
    records: &[FeedRecord],
) -> Result<u64, DbError> {
    let columns = RecordColumns::from_records(records);
    let result = sqlx::query(sql)
        .bind(&columns.uids)
        .bind(&columns.titles)
        .bind(&columns.links)
        .bind(&columns.summaries)
        .bind(&columns.published_dates)
        .bind(&columns.gmt_dates)
        .bind(&partition.category)
        .bind(&partition.source)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Rows with a `NULL` `gmt_date`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_missing_gmt(pool: &PgPool) -> Result<Vec<MissingGmtRow>, DbError> {
    let rows = sqlx::query_as::<_, MissingGmtRow>(
        "SELECT id, published_date FROM rss_feeds \
         WHERE gmt_date IS NULL \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Set `gmt_date` for one row. Returns `false` if the row no longer exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_gmt_date(
    pool: &PgPool,
    id: i64,
    gmt_date: NaiveDateTime,
) -> Result<bool, DbError> {
    let result = sqlx::query("UPDATE rss_feeds SET gmt_date = $2 WHERE id = $1")
        .bind(id)
        .bind(gmt_date)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Number of stored rows for one partition.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_feed_rows(pool: &PgPool, partition: &Partition) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM rss_feeds WHERE category = $1 AND source = $2",
    )
    .bind(&partition.category)
    .bind(&partition.source)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
