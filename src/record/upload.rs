//! Upload pipeline: validate, store the original, record it.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::UploadError;
use crate::io::write_new_atomic_async;

use super::store::{ImageRecord, ImageRecords};

/// Content types accepted when none are configured.
pub const DEFAULT_ALLOW_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Extension used when the content type has no subtype.
const DEFAULT_EXTENSION: &str = "jpeg";

/// Suffixed names tried before an upload gives up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Slug used when nothing usable remains of the requested name.
const FALLBACK_SLUG: &str = "image";

/// One file taken from an upload request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name sent by the client
    pub file_name: String,

    /// Declared MIME type
    pub content_type: String,

    pub data: Bytes,
}

/// Stores uploaded originals and creates their records.
pub struct Uploader<R: ImageRecords> {
    records: Arc<R>,
    source_dir: PathBuf,
    allow_types: Vec<String>,
}

impl<R: ImageRecords> Uploader<R> {
    pub fn new(records: Arc<R>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            records,
            source_dir: source_dir.into(),
            allow_types: DEFAULT_ALLOW_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Replace the accepted content types.
    pub fn with_allow_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allow_types = types
            .into_iter()
            .map(|t| normalize_content_type(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn allow_types(&self) -> &[String] {
        &self.allow_types
    }

    /// Whether a content type passes the allow list.
    pub fn is_allowed(&self, content_type: &str) -> bool {
        let normalized = normalize_content_type(content_type);
        self.allow_types.iter().any(|t| *t == normalized)
    }

    /// Store one uploaded file and insert its record.
    ///
    /// `display_name`, when given, replaces the file stem in the storage name.
    pub async fn store(
        &self,
        file: UploadFile,
        display_name: Option<&str>,
    ) -> Result<ImageRecord, UploadError> {
        if !self.is_allowed(&file.content_type) {
            warn!(
                content_type = %file.content_type,
                file_name = %file.file_name,
                "Upload rejected: content type not allowed"
            );
            return Err(UploadError::UnsupportedType {
                content_type: file.content_type,
            });
        }
        if file.data.is_empty() {
            return Err(UploadError::Invalid(format!(
                "file '{}' is empty",
                file.file_name
            )));
        }

        tokio::fs::create_dir_all(&self.source_dir)
            .await
            .map_err(|e| UploadError::Storage(format!("{}: {}", self.source_dir.display(), e)))?;

        let base = storage_name(&file.file_name, &file.content_type, display_name);
        let size = file.data.len() as u64;
        let (name, path) = self.write_original(&base, file.data).await?;

        let record = ImageRecord {
            id: Uuid::new_v4().to_string(),
            name,
            path,
            size,
            original_name: file.file_name,
            content_type: normalize_content_type(&file.content_type),
        };

        if let Err(e) = self.records.insert(record.clone()).await {
            let _ = tokio::fs::remove_file(&record.path).await;
            return Err(e.into());
        }

        info!(
            image_id = %record.id,
            name = %record.name,
            bytes = record.size,
            "Image uploaded"
        );
        Ok(record)
    }

    /// Write the original under `base`, or under a suffixed name if `base`
    /// is taken. Never replaces an existing file.
    async fn write_original(&self, base: &str, data: Bytes) -> Result<(String, PathBuf), UploadError> {
        let mut name = base.to_string();

        for _ in 0..MAX_NAME_ATTEMPTS {
            match write_new_atomic_async(self.source_dir.clone(), name.clone(), data.clone()).await {
                Ok(path) => return Ok((name, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(name = %name, "Storage name taken, retrying with suffix");
                    name = dedupe_name(base);
                }
                Err(e) => return Err(UploadError::Storage(format!("{}: {}", name, e))),
            }
        }

        Err(UploadError::Storage(format!(
            "no free storage name for '{}' after {} attempts",
            base, MAX_NAME_ATTEMPTS
        )))
    }
}

/// Build `<millis>-<slug>.<ext>` for an upload.
pub fn storage_name(file_name: &str, content_type: &str, display_name: Option<&str>) -> String {
    let stem = file_name.split('.').next().unwrap_or_default();
    let base = display_name.filter(|n| !n.trim().is_empty()).unwrap_or(stem);

    format!(
        "{}-{}.{}",
        unix_millis(),
        slugify(base),
        extension_for(content_type)
    )
}

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else become `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// File extension derived from the MIME subtype.
pub fn extension_for(content_type: &str) -> String {
    let normalized = normalize_content_type(content_type);
    match normalized.split_once('/') {
        Some((_, sub)) if !sub.is_empty() => slugify(sub),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Lowercase the type and drop parameters such as `; charset=...`.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn dedupe_name(name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, suffix, ext),
        None => format!("{}-{}", name, suffix),
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
