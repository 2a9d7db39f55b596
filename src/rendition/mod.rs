//! On-demand renditions.
//!
//! This module turns an `(image id, size name)` request into encoded bytes:
//!
//! - [`SizeCatalog`]: the fixed set of named sizes
//! - [`ImageTransformer`]: decode, resize, re-encode
//! - [`CacheStore`]: one file per rendition under `<root>/<size>/<id>`
//! - [`CacheLifecycle`]: directory creation and bulk clears
//! - [`RenditionService`]: the coordinator, with single-flight generation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rendition_server::record::JsonRecordStore;
//! use rendition_server::rendition::{
//!     CacheStore, ImageTransformer, RenditionService, ServiceOptions, SizeCatalog,
//! };
//!
//! let records = Arc::new(JsonRecordStore::open("./data/db.json").await?);
//! let service = RenditionService::start(
//!     records,
//!     ImageTransformer::new(),
//!     CacheStore::new("./data/cache"),
//!     Arc::new(SizeCatalog::default()),
//!     ServiceOptions::default(),
//! )
//! .await?;
//!
//! let thumb = service.get_rendition("550e8400-e29b-41d4-a716-446655440000", "thumb").await?;
//! ```

mod catalog;
mod lifecycle;
mod service;
mod store;
mod transform;

pub use catalog::{
    CatalogError, SizeCatalog, SizeMode, SizeSpec, DEFAULT_SIZES, DEFAULT_SIZE_NAME,
    MAX_DIMENSION,
};
pub use lifecycle::CacheLifecycle;
pub use service::{Rendition, RenditionService, ServiceOptions};
pub use store::{validate_key, CacheStore};
pub use transform::{
    clamp_quality, detect_content_type, detect_format, is_valid_quality, output_format,
    ImageTransformer, RenditionTransformer, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
