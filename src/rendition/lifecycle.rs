//! Cache directory lifecycle.
//!
//! Every catalog size owns one directory under the cache root. The
//! directories exist from startup onward and are recreated after each clear.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::StoreError;

use super::catalog::SizeCatalog;

/// Creates and purges the cache directory tree.
#[derive(Debug, Clone)]
pub struct CacheLifecycle {
    root: PathBuf,
    catalog: Arc<SizeCatalog>,
}

impl CacheLifecycle {
    pub fn new(root: impl Into<PathBuf>, catalog: Arc<SizeCatalog>) -> Self {
        Self {
            root: root.into(),
            catalog,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache root and one directory per size name.
    ///
    /// Idempotent; existing directories and their contents are left alone.
    pub async fn ensure_directories<I, S>(&self, size_names: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        for name in size_names {
            let dir = self.root.join(name.as_ref());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io(&dir, e))?;
        }

        Ok(())
    }

    /// Create directories for every size in the catalog.
    pub async fn ensure_catalog_directories(&self) -> Result<(), StoreError> {
        self.ensure_directories(self.catalog.names()).await
    }

    /// Remove everything under the cache root, then recreate the size
    /// directories.
    ///
    /// Stray directories and leftover temp files go too. Nothing outside the
    /// cache root is touched.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut removed = 0usize;

        match tokio::fs::read_dir(&self.root).await {
            Ok(mut entries) => {
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| StoreError::io(&self.root, e))?
                {
                    let path = entry.path();
                    let file_type = entry
                        .file_type()
                        .await
                        .map_err(|e| StoreError::io(&path, e))?;

                    let result = if file_type.is_dir() {
                        tokio::fs::remove_dir_all(&path).await
                    } else {
                        tokio::fs::remove_file(&path).await
                    };

                    match result {
                        Ok(()) => removed += 1,
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(StoreError::io(&path, e)),
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "Cache root missing, nothing to clear");
            }
            Err(e) => return Err(StoreError::io(&self.root, e)),
        }

        self.ensure_catalog_directories().await?;

        info!(
            root = %self.root.display(),
            entries_removed = removed,
            sizes = self.catalog.len(),
            "Rendition cache cleared"
        );
        Ok(())
    }
}
