//! Feed timestamp parsing and UTC rendering.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Rendering used for `gmt_date` in both sinks.
pub const GMT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive layouts tried after RFC 2822/3339; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

/// Parse a timestamp as it appears in RSS/Atom feeds.
///
/// Accepts RFC 2822 (`pubDate`), RFC 3339 (`published`/`updated`/`dc:date`),
/// a handful of naive ISO-like layouts (assumed UTC), and bare dates
/// (midnight UTC). Returns `None` for anything else.
#[must_use]
pub fn parse_feed_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a UTC timestamp in [`GMT_FORMAT`].
#[must_use]
pub fn render_gmt(ts: DateTime<Utc>) -> String {
    ts.format(GMT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gmt(raw: &str) -> Option<String> {
        parse_feed_timestamp(raw).map(render_gmt)
    }

    #[test]
    fn parses_rfc2822_with_gmt_zone() {
        assert_eq!(
            gmt("Fri, 01 Mar 2024 10:00:00 GMT").as_deref(),
            Some("2024-03-01 10:00:00")
        );
    }

    #[test]
    fn parses_rfc2822_with_offset_into_utc() {
        assert_eq!(
            gmt("Fri, 01 Mar 2024 05:00:00 -0500").as_deref(),
            Some("2024-03-01 10:00:00")
        );
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(
            gmt("2024-03-01T12:00:00+02:00").as_deref(),
            Some("2024-03-01 10:00:00")
        );
        assert_eq!(
            gmt("2024-03-01T10:00:00Z").as_deref(),
            Some("2024-03-01 10:00:00")
        );
    }

    #[test]
    fn naive_layouts_are_treated_as_utc() {
        assert_eq!(
            gmt("2024-03-01 10:00:00").as_deref(),
            Some("2024-03-01 10:00:00")
        );
        assert_eq!(gmt("2024-03-01").as_deref(), Some("2024-03-01 00:00:00"));
    }

    #[test]
    fn garbage_and_blank_yield_none() {
        assert!(parse_feed_timestamp("yesterday-ish").is_none());
        assert!(parse_feed_timestamp("   ").is_none());
    }
}
