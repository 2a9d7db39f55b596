//! HTTP server layer for the rendition server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      GET /image/{size}/{id}   POST /upload   DELETE /cache      │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error mapping)│  │ (router config, CORS, body) │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    clear_cache_handler, default_rendition_handler, health_handler, info_handler,
    rendition_handler, rendition_status, sizes_handler, upload_handler, upload_status, AppState,
    ClearResponse, ErrorResponse, HandlerError, HealthResponse, InfoResponse, UploadQueryParams,
    UploadResponse, UploadedImage, CACHE_HIT_HEADER, GENERIC_ERROR_MESSAGE, UPLOAD_FIELD,
};
pub use routes::{create_router, RouterConfig, DEFAULT_CACHE_MAX_AGE, DEFAULT_UPLOAD_MAX_BYTES};
