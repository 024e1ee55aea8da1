use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::Partition;
use crate::ConfigError;

/// One configured feed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub source: String,
    pub category: String,
}

impl FeedSource {
    #[must_use]
    pub fn partition(&self) -> Partition {
        Partition::new(&self.source, &self.category)
    }
}

/// Body fix-ups applied to a source's raw feed before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFilter {
    /// Remove every `\n` and `\r` from the body.
    StripNewlines,
}

impl ContentFilter {
    #[must_use]
    pub fn apply(self, body: Vec<u8>) -> Vec<u8> {
        match self {
            ContentFilter::StripNewlines => body
                .into_iter()
                .filter(|b| *b != b'\n' && *b != b'\r')
                .collect(),
        }
    }
}

/// Immutable set of configured sources, in iteration order.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<FeedSource>,
    /// Extra content filters keyed by source name.
    #[serde(default)]
    pub content_filters: BTreeMap<String, ContentFilter>,
}

/// Load and validate the source registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourceRegistry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_sources(&content)
}

/// Parse and validate a source registry from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sources(yaml: &str) -> Result<SourceRegistry, ConfigError> {
    let registry: SourceRegistry = serde_yaml::from_str(yaml)?;
    validate_sources(&registry)?;
    Ok(registry)
}

fn validate_sources(registry: &SourceRegistry) -> Result<(), ConfigError> {
    if registry.sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one source must be configured".to_string(),
        ));
    }

    let mut seen_urls = HashSet::new();
    for feed in &registry.sources {
        let url = feed.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "source '{}' has non-http url '{}'",
                feed.source, feed.url
            )));
        }
        if !seen_urls.insert(url.to_string()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source url: '{url}'"
            )));
        }
        validate_label("source", &feed.source, url)?;
        validate_label("category", &feed.category, url)?;
    }

    for name in registry.content_filters.keys() {
        validate_label("content filter source", name, name)?;
    }

    Ok(())
}

/// Labels become path components of the partition file.
fn validate_label(kind: &str, label: &str, url: &str) -> Result<(), ConfigError> {
    if label.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{kind} must be non-empty (url '{url}')"
        )));
    }
    if label.contains(['/', '\\']) || label == "." || label == ".." {
        return Err(ConfigError::Validation(format!(
            "{kind} '{label}' is not a valid path component (url '{url}')"
        )));
    }
    Ok(())
}
