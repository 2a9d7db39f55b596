//! Image records and the lookup trait the rendition service depends on.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// One uploaded image.
///
/// Created by the upload pipeline and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Opaque unique identifier (UUID v4)
    pub id: String,

    /// Storage file name inside the source directory
    pub name: String,

    /// Path of the original file
    pub path: PathBuf,

    /// Original size in bytes
    pub size: u64,

    /// File name supplied by the client
    #[serde(default)]
    pub original_name: String,

    /// MIME type supplied by the client
    #[serde(default)]
    pub content_type: String,
}

/// Source of image records and their original bytes.
///
/// The rendition service only reads through this trait, which keeps it
/// independent of how records are persisted.
#[async_trait]
pub trait ImageRecords: Send + Sync + 'static {
    /// Find a record by id.
    async fn lookup(&self, id: &str) -> Result<Option<ImageRecord>, RecordError>;

    /// Persist a new record.
    async fn insert(&self, record: ImageRecord) -> Result<(), RecordError>;

    /// Load the original bytes for a record.
    async fn read_original(&self, record: &ImageRecord) -> Result<Bytes, RecordError> {
        match tokio::fs::read(&record.path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RecordError::OriginalMissing(record.path.display().to_string()))
            }
            Err(e) => Err(RecordError::Io(format!(
                "{}: {}",
                record.path.display(),
                e
            ))),
        }
    }
}
