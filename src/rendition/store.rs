//! On-disk rendition store.
//!
//! Renditions live at `<root>/<size>/<image id>`. Writes go through
//! [`crate::io::write_atomic`], so a reader sees either no file or the
//! complete file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;
use crate::io::write_atomic_async;

/// Longest accepted path component.
const MAX_KEY_LEN: usize = 255;

/// Per-size directory tree of cached renditions.
///
/// Cheap to clone; holds only the root path.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root`. Nothing is created on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every rendition of one size.
    pub fn size_dir(&self, size: &str) -> PathBuf {
        self.root.join(size)
    }

    /// Path of the rendition file for `(size, image_id)`.
    pub fn rendition_path(&self, size: &str, image_id: &str) -> Result<PathBuf, StoreError> {
        validate_key(size)?;
        validate_key(image_id)?;
        Ok(self.root.join(size).join(image_id))
    }

    /// Whether a complete rendition is cached.
    pub async fn exists(&self, size: &str, image_id: &str) -> bool {
        match self.rendition_path(size, image_id) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Read a cached rendition.
    ///
    /// Returns [`StoreError::NotFound`] when nothing is cached for the key.
    pub async fn read(&self, size: &str, image_id: &str) -> Result<Bytes, StoreError> {
        let path = self.rendition_path(size, image_id)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                size: size.to_string(),
                image_id: image_id.to_string(),
            }),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Write a rendition with all-or-nothing visibility.
    ///
    /// The size directory must already exist.
    pub async fn write_atomic(
        &self,
        size: &str,
        image_id: &str,
        data: Bytes,
    ) -> Result<PathBuf, StoreError> {
        let path = self.rendition_path(size, image_id)?;
        let dir = self.size_dir(size);

        let len = data.len();
        let written = write_atomic_async(dir, image_id.to_string(), data)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        debug!(size = size, image_id = image_id, bytes = len, "Rendition written");
        Ok(written)
    }
}

/// Check that a size name or image id is safe to use as a file name.
///
/// Rejects empty names, dot-prefixed names (reserved for temp files),
/// separators and parent references.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key.starts_with('.')
        || key.contains("..")
        || key.contains(['/', '\\', '\0']);

    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
