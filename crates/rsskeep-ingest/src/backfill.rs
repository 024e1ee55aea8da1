//! Fills in `gmt_date` for rows stored before it could be derived.

use chrono::NaiveDateTime;
use rsskeep_core::parse_feed_timestamp;
use rsskeep_db::DbError;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
}

/// UTC wall-clock time for a stored `published_date`, if it can be parsed.
#[must_use]
pub fn gmt_from_published(published_date: Option<&str>) -> Option<NaiveDateTime> {
    published_date
        .and_then(parse_feed_timestamp)
        .map(|ts| ts.naive_utc())
}

/// Update every row whose `gmt_date` is `NULL`, one statement per row.
///
/// Rows with an unparseable `published_date`, and rows whose update fails,
/// are logged and skipped.
///
/// # Errors
///
/// Returns [`DbError`] only if the candidate rows cannot be listed.
pub async fn backfill_gmt(pool: &PgPool) -> Result<BackfillReport, DbError> {
    let rows = rsskeep_db::list_missing_gmt(pool).await?;
    let mut report = BackfillReport {
        scanned: rows.len(),
        updated: 0,
    };

    for row in rows {
        let Some(gmt_date) = gmt_from_published(row.published_date.as_deref()) else {
            tracing::debug!(
                id = row.id,
                published_date = row.published_date.as_deref().unwrap_or(""),
                "unparseable published_date; leaving gmt_date empty"
            );
            continue;
        };

        match rsskeep_db::update_gmt_date(pool, row.id, gmt_date).await {
            Ok(true) => report.updated += 1,
            Ok(false) => tracing::debug!(id = row.id, "row vanished before backfill"),
            Err(e) => tracing::warn!(id = row.id, error = %e, "gmt_date backfill failed"),
        }
    }

    Ok(report)
}
