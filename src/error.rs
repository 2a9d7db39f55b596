use std::time::Duration;

use thiserror::Error;

/// Errors raised by the on-disk rendition cache.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No rendition file exists for the key
    #[error("Rendition not cached: {size}/{image_id}")]
    NotFound { size: String, image_id: String },

    /// The identifier cannot be used as a cache file name
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Filesystem failure
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },
}

impl StoreError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors raised by the rendition transformer.
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Source bytes are not an image format we can handle
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// Source bytes could not be decoded
    #[error("Failed to decode image: {message}")]
    DecodeError { message: String },

    /// Resized image could not be encoded
    #[error("Failed to encode image: {message}")]
    EncodeError { message: String },
}

/// Errors raised by the image record store.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// The record exists but its original file is gone
    #[error("Original file missing: {0}")]
    OriginalMissing(String),

    /// The record document could not be parsed or serialized
    #[error("Corrupt record store: {0}")]
    Corrupt(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by the rendition coordinator.
///
/// Every variant propagates unchanged to the HTTP boundary.
#[derive(Debug, Clone, Error)]
pub enum RenditionError {
    /// Requested size is not in the catalog
    #[error("Unknown size: {size}")]
    UnknownSize { size: String },

    /// No image with this identifier
    #[error("Image not found: {image_id}")]
    ImageNotFound { image_id: String },

    /// Decoding, format detection or encoding failed
    #[error("Transform failed: {0}")]
    TransformFailed(#[from] TransformError),

    /// The transform did not finish within the configured timeout
    #[error("Transform timed out after {after:?}")]
    TransformTimeout { after: Duration },

    /// The generated rendition could not be written to the cache
    #[error("Cache write failed: {message}")]
    CacheWriteFailed { message: String },

    /// A cached rendition exists but could not be read
    #[error("Cache read failed: {message}")]
    CacheReadFailed { message: String },

    /// The original image could not be loaded
    #[error("Source image unavailable for {image_id}: {message}")]
    SourceUnavailable { image_id: String, message: String },

    /// The record store failed
    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordError),
}

/// Errors raised while accepting uploads.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// Content type is not in the allow list
    #[error("Unsupported content type: {content_type}")]
    UnsupportedType { content_type: String },

    /// Request carried no usable file
    #[error("Invalid upload: {0}")]
    Invalid(String),

    /// Original could not be written
    #[error("Failed to store original: {0}")]
    Storage(String),

    /// Record could not be persisted
    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordError),
}
