//! Per-(source, category) partition files and the dedup state derived from them.
//!
//! A partition file is the durable record of every entry ever accepted for
//! its partition. The id-set and title-set used for dedup are rebuilt from it
//! on every load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rsskeep_core::{Entry, Partition};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::StoreError;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// The on-disk document: `<data>` with one `<entry>` per accepted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "data")]
pub struct PartitionDocument {
    #[serde(rename = "entry", default)]
    pub entries: Vec<StoredEntry>,
}

/// One persisted record. Missing child elements read back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub published_date: String,
}

impl From<&Entry> for StoredEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            uid: entry.id.clone(),
            title: entry.title.clone(),
            link: entry.link.clone(),
            summary: entry.summary.clone(),
            published_date: entry.published.clone(),
        }
    }
}

/// In-memory dedup state for one partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionState {
    document: PartitionDocument,
    ids: HashSet<String>,
    titles: HashSet<String>,
    existed: bool,
}

impl PartitionState {
    /// State for a partition that has never been written.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_document(document: PartitionDocument, existed: bool) -> Self {
        let ids = document.entries.iter().map(|e| e.uid.clone()).collect();
        let titles = document.entries.iter().map(|e| e.title.clone()).collect();
        Self {
            document,
            ids,
            titles,
            existed,
        }
    }

    /// Whether the partition file existed when this state was loaded.
    #[must_use]
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// An entry is new iff neither its id nor its title has been seen.
    #[must_use]
    pub fn is_new(&self, entry: &Entry) -> bool {
        !self.ids.contains(&entry.id) && !self.titles.contains(&entry.title)
    }

    /// Record `entry` as ingested: both keys join their sets and the record is
    /// appended to the document.
    pub fn accept(&mut self, entry: &Entry) {
        self.ids.insert(entry.id.clone());
        self.titles.insert(entry.title.clone());
        self.document.entries.push(StoredEntry::from(entry));
    }

    #[must_use]
    pub fn document(&self) -> &PartitionDocument {
        &self.document
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.document.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.document.entries.is_empty()
    }
}

/// Partition files rooted at a data directory: `<root>/<source>/<category>.xml`.
#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, partition: &Partition) -> PathBuf {
        partition.file_path(&self.root)
    }

    /// Load the dedup state for `partition`. A missing file is a first run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, or
    /// [`StoreError::Parse`] if its contents are not a partition document.
    pub async fn load(&self, partition: &Partition) -> Result<PartitionState, StoreError> {
        let path = self.path_for(partition);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let document = parse_document(&path, &content)?;
                Ok(PartitionState::from_document(document, true))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PartitionState::empty()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Number of records stored for `partition`, or `None` if it has no file yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be loaded.
    pub async fn record_count(&self, partition: &Partition) -> Result<Option<usize>, StoreError> {
        let state = self.load(partition).await?;
        Ok(state.existed().then_some(state.len()))
    }

    /// Rewrite the whole partition file from `state`.
    ///
    /// The document is written to a temporary sibling and renamed into place,
    /// so a failed write leaves the previous file intact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialize`] or [`StoreError::Io`].
    pub async fn save(&self, partition: &Partition, state: &PartitionState) -> Result<(), StoreError> {
        let path = self.path_for(partition);
        let xml = render_document(partition, state.document())?;

        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)
            .await
            .map_err(|source| StoreError::Io {
                path: parent.clone(),
                source,
            })?;

        let temp_path = parent.join(format!(".{}.{}.tmp", partition.category, Uuid::new_v4()));
        if let Err(source) = write_new_file(&temp_path, xml.as_bytes()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io { path, source });
        }

        tracing::debug!(
            path = %path.display(),
            records = state.len(),
            "partition file written"
        );
        Ok(())
    }

    /// Every `<source>/<category>.xml` under the root, sorted.
    ///
    /// Stray files at the root, non-XML files, and hidden files are skipped.
    /// A missing root yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if a directory cannot be listed.
    pub async fn list_partitions(&self) -> Result<Vec<Partition>, StoreError> {
        let mut partitions = Vec::new();

        let mut sources = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(partitions),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        while let Some(source_dir) = next_entry(&mut sources, &self.root).await? {
            let source_path = source_dir.path();
            if !source_path.is_dir() {
                continue;
            }
            let Some(source) = visible_name(&source_path) else {
                continue;
            };

            let mut files = fs::read_dir(&source_path)
                .await
                .map_err(|e| StoreError::Io {
                    path: source_path.clone(),
                    source: e,
                })?;
            while let Some(file) = next_entry(&mut files, &source_path).await? {
                let file_path = file.path();
                if !file_path.is_file()
                    || file_path.extension().and_then(|ext| ext.to_str()) != Some("xml")
                {
                    continue;
                }
                let Some(category) = file_path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .filter(|stem| !stem.starts_with('.'))
                else {
                    continue;
                };
                partitions.push(Partition::new(source.clone(), category));
            }
        }

        partitions.sort();
        Ok(partitions)
    }
}

/// Read the partition document stored at `path`.
///
/// # Errors
///
/// Returns [`StoreError::Io`] or [`StoreError::Parse`].
pub async fn read_document(path: &Path) -> Result<PartitionDocument, StoreError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_document(path, &content)
}

fn parse_document(path: &Path, content: &str) -> Result<PartitionDocument, StoreError> {
    quick_xml::de::from_str(content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn render_document(
    partition: &Partition,
    document: &PartitionDocument,
) -> Result<String, StoreError> {
    let mut xml = String::from(XML_DECLARATION);
    let mut serializer = quick_xml::se::Serializer::new(&mut xml);
    serializer.indent(' ', 2);
    document
        .serialize(serializer)
        .map_err(|e| StoreError::Serialize {
            partition: partition.to_string(),
            message: e.to_string(),
        })?;
    xml.push('\n');
    Ok(xml)
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

async fn next_entry(
    dir: &mut fs::ReadDir,
    path: &Path,
) -> Result<Option<fs::DirEntry>, StoreError> {
    dir.next_entry().await.map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn visible_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.starts_with('.'))
        .map(str::to_string)
}
