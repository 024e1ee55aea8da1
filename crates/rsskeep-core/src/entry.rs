//! Normalized feed entries and the (source, category) partitions they belong to.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::render_gmt;

/// The (source, category) unit of dedup and storage granularity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub source: String,
    pub category: String,
}

impl Partition {
    #[must_use]
    pub fn new(source: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            category: category.into(),
        }
    }

    /// Location of this partition's document: `<root>/<source>/<category>.xml`.
    #[must_use]
    pub fn file_path(&self, root: &Path) -> PathBuf {
        root.join(&self.source)
            .join(format!("{}.xml", self.category))
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.source, self.category)
    }
}

/// One normalized feed item, ready for dedup and the sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Feed-provided identifier, or the link when the feed supplied none.
    pub id: String,
    /// ASCII-only title; also the secondary dedup key.
    pub title: String,
    pub link: String,
    /// Plain-text, ASCII-only summary. Empty when the feed had none.
    pub summary: String,
    /// Timestamp text exactly as the feed supplied it.
    pub published: String,
    pub published_utc: Option<DateTime<Utc>>,
}

impl Entry {
    /// `published_utc` rendered as `YYYY-MM-DD HH:MM:SS`, or `""` when unknown.
    #[must_use]
    pub fn gmt_date(&self) -> String {
        self.published_utc.map(render_gmt).unwrap_or_default()
    }
}
