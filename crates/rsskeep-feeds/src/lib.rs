//! Feed retrieval and parsing: raw bytes over HTTP in, normalized entries out.

pub mod error;
pub mod fetch;
pub mod parse;

pub use error::{FetchError, ParseError};
pub use fetch::{ContentFilters, FeedFetcher};
pub use parse::{parse_feed, ParsedFeed, RejectReason, RejectedEntry};
