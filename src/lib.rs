//! # Rendition Server
//!
//! An image server that generates resized renditions on demand and caches
//! them on disk.
//!
//! Each image is uploaded once. Clients then ask for it by size name
//! (`thumb`, `medium`, `full`, ...). The first request for a size decodes,
//! resizes and re-encodes the original and stores the result; every later
//! request is served straight from the cache directory.
//!
//! ## Features
//!
//! - **Fixed size catalog**: `NAME=WxH[:fit|crop]` or `NAME=original`
//! - **Single-flight generation**: concurrent misses for one rendition share one transform
//! - **Atomic cache writes**: readers never see a partially written file
//! - **Bulk clear**: drop every rendition without touching originals
//! - **Uploads**: multipart upload with content-type filtering
//!
//! ## Architecture
//!
//! - [`rendition`] - Size catalog, transformer, cache store and the coordinating service
//! - [`record`] - Image records, the JSON record store and the upload pipeline
//! - [`io`] - Atomic file writes
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types for every layer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rendition_server::{
//!     create_router, AppState, CacheStore, ImageTransformer, JsonRecordStore, RenditionService,
//!     RouterConfig, ServiceOptions, SizeCatalog, Uploader,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let records = Arc::new(JsonRecordStore::open("./data/db.json").await?);
//!     let service = RenditionService::start(
//!         Arc::clone(&records),
//!         ImageTransformer::new(),
//!         CacheStore::new("./data/cache"),
//!         Arc::new(SizeCatalog::parse(["thumb=100x100:crop", "full=original"])?),
//!         ServiceOptions::default(),
//!     )
//!     .await?;
//!     let uploader = Uploader::new(records, "./data/source");
//!
//!     let router = create_router(AppState::new(service, uploader), RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod record;
pub mod rendition;
pub mod server;

// Re-export commonly used types
pub use config::{ClearConfig, Cli, Command, ServeConfig};
pub use error::{RecordError, RenditionError, StoreError, TransformError, UploadError};
pub use record::{ImageRecord, ImageRecords, JsonRecordStore, UploadFile, Uploader};
pub use rendition::{
    CacheLifecycle, CacheStore, CatalogError, ImageTransformer, Rendition, RenditionService,
    RenditionTransformer, ServiceOptions, SizeCatalog, SizeMode, SizeSpec, DEFAULT_JPEG_QUALITY,
    DEFAULT_SIZE_NAME,
};
pub use server::{create_router, AppState, ErrorResponse, HandlerError, RouterConfig};
