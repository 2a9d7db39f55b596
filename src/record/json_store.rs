//! JSON-file record store.
//!
//! Records are kept in memory and mirrored to a single document:
//!
//! ```text
//! {"resource": [ {"id": "...", "name": "...", "path": "...", "size": 123}, ... ]}
//! ```
//!
//! Every insert rewrites the whole document through an atomic replace, so a
//! crash never leaves a half-written database behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RecordError;
use crate::io::write_atomic_async;

use super::store::{ImageRecord, ImageRecords};

#[derive(Debug, Deserialize)]
struct RecordDocument {
    #[serde(default)]
    resource: Vec<ImageRecord>,
}

/// Record store backed by one JSON file.
pub struct JsonRecordStore {
    path: PathBuf,
    records: RwLock<Vec<ImageRecord>>,
}

impl JsonRecordStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// The parent directory is created if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let path = path.into();

        let dir = parent_dir(&path);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RecordError::Io(format!("{}: {}", dir.display(), e)))?;

        let records = match tokio::fs::read(&path).await {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(data) => {
                let doc: RecordDocument = serde_json::from_slice(&data)
                    .map_err(|e| RecordError::Corrupt(format!("{}: {}", path.display(), e)))?;
                doc.resource
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(RecordError::Io(format!("{}: {}", path.display(), e))),
        };

        info!(
            path = %path.display(),
            records = records.len(),
            "Record store opened"
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn persist(&self, records: &[ImageRecord]) -> Result<(), RecordError> {
        let doc = RecordDocumentRef { resource: records };
        let json =
            serde_json::to_vec_pretty(&doc).map_err(|e| RecordError::Corrupt(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RecordError::Io(format!("{}: not a file path", self.path.display())))?;

        write_atomic_async(parent_dir(&self.path), file_name, Bytes::from(json))
            .await
            .map_err(|e| RecordError::Io(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct RecordDocumentRef<'a> {
    resource: &'a [ImageRecord],
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[async_trait]
impl ImageRecords for JsonRecordStore {
    async fn lookup(&self, id: &str) -> Result<Option<ImageRecord>, RecordError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, record: ImageRecord) -> Result<(), RecordError> {
        let mut records = self.records.write().await;
        records.push(record);

        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }

        if let Some(record) = records.last() {
            debug!(image_id = %record.id, name = %record.name, "Record inserted");
        }
        Ok(())
    }
}
