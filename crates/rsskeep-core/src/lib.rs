//! Shared domain types, normalization helpers, and configuration for rsskeep.

pub mod app_config;
pub mod config;
pub mod entry;
pub mod sources;
pub mod text;
pub mod time;

pub use app_config::{AppConfig, Environment};
pub use config::load_app_config;
pub use entry::{Entry, Partition};
pub use sources::{load_sources, ContentFilter, FeedSource, SourceRegistry};
pub use text::{ascii_only, strip_html};
pub use time::{parse_feed_timestamp, render_gmt, GMT_FORMAT};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("invalid source configuration: {0}")]
    Validation(String),
}
