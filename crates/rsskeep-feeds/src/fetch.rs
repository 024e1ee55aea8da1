//! HTTP retrieval of raw feed bodies.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use rsskeep_core::{ContentFilter, FeedSource};

use crate::error::FetchError;

/// Source name → body fix-up applied before parsing.
///
/// Quirks are per source, not general rules; anything not listed is passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilters {
    by_source: BTreeMap<String, ContentFilter>,
}

impl ContentFilters {
    /// Known quirks: BetaKit serves leading newlines before the XML prolog.
    #[must_use]
    pub fn builtin() -> Self {
        let mut by_source = BTreeMap::new();
        by_source.insert("betakit".to_string(), ContentFilter::StripNewlines);
        Self { by_source }
    }

    /// The built-in table with `overrides` layered on top.
    #[must_use]
    pub fn with_overrides(overrides: &BTreeMap<String, ContentFilter>) -> Self {
        let mut filters = Self::builtin();
        filters
            .by_source
            .extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        filters
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<ContentFilter> {
        self.by_source.get(source).copied()
    }

    #[must_use]
    pub fn apply(&self, source: &str, body: Vec<u8>) -> Vec<u8> {
        match self.get(source) {
            Some(filter) => filter.apply(body),
            None => body,
        }
    }
}

impl Default for ContentFilters {
    fn default() -> Self {
        Self::builtin()
    }
}

/// One-shot feed downloader: a single GET per call, no retries.
///
/// Retrying is the scheduler's job (it moves on and comes back next pass).
pub struct FeedFetcher {
    client: Client,
    filters: ContentFilters,
}

impl FeedFetcher {
    /// Creates a `FeedFetcher` with a request timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying client cannot be built.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        filters: ContentFilters,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, filters })
    }

    /// Download the raw body for `feed`, with its content filter applied.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Request`]: network, TLS, or timeout failure.
    /// - [`FetchError::Status`]: any non-2xx response.
    pub async fn fetch(&self, feed: &FeedSource) -> Result<Vec<u8>, FetchError> {
        let request_error = |source: reqwest::Error| FetchError::Request {
            feed: feed.source.clone(),
            category: feed.category.clone(),
            source,
        };

        let response = self
            .client
            .get(&feed.url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                feed: feed.source.clone(),
                category: feed.category.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?.to_vec();
        tracing::debug!(
            source = %feed.source,
            category = %feed.category,
            bytes = body.len(),
            "fetched feed"
        );
        Ok(self.filters.apply(&feed.source, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_filters_cover_betakit_only() {
        let filters = ContentFilters::builtin();
        assert_eq!(filters.get("betakit"), Some(ContentFilter::StripNewlines));
        assert_eq!(filters.get("techcrunch"), None);
    }

    #[test]
    fn overrides_extend_builtin_table() {
        let mut overrides = BTreeMap::new();
        overrides.insert("finovate".to_string(), ContentFilter::StripNewlines);
        let filters = ContentFilters::with_overrides(&overrides);
        assert_eq!(filters.get("betakit"), Some(ContentFilter::StripNewlines));
        assert_eq!(filters.get("finovate"), Some(ContentFilter::StripNewlines));
    }

    #[test]
    fn unfiltered_source_body_passes_through() {
        let filters = ContentFilters::builtin();
        let body = b"<rss>\n</rss>".to_vec();
        assert_eq!(filters.apply("techcrunch", body.clone()), body);
        assert_eq!(filters.apply("betakit", body), b"<rss></rss>".to_vec());
    }
}
