use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse partition file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("failed to serialize partition {partition}: {message}")]
    Serialize { partition: String, message: String },
}

#[derive(Debug, Error)]
pub enum SinkError {
    /// The partition file could not be loaded or rewritten; nothing reached
    /// the database for this partition.
    #[error("partition file sink failed: {0}")]
    File(#[from] StoreError),
}
