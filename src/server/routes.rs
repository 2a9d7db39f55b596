//! Router configuration for the rendition server.
//!
//! # Route Structure
//!
//! ```text
//! GET    /                     - Package information
//! GET    /health               - Health check
//! GET    /sizes                - Size catalog
//! GET    /image/{size}/{id}    - Rendition at a named size
//! GET    /image/{id}           - Rendition at the default size
//! POST   /upload               - Multipart upload
//! DELETE /cache                - Clear the rendition cache
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rendition_server::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(service, uploader);
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()])
//!     .with_debug(true);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    clear_cache_handler, default_rendition_handler, health_handler, info_handler,
    rendition_handler, sizes_handler, upload_handler, AppState,
};
use crate::record::ImageRecords;
use crate::rendition::RenditionTransformer;

/// Default request body limit for uploads (10 MiB).
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Default Cache-Control max-age for renditions (1 day).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 86400;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Return raw error details to clients
    pub debug: bool,

    /// Largest accepted request body in bytes
    pub upload_max_bytes: usize,

    /// Base URL for absolute links in upload responses
    pub public_url: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 day
    /// - Tracing is enabled
    /// - Server error details are hidden
    /// - Uploads are limited to 10 MiB
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
            debug: false,
            upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            public_url: None,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Enable or disable raw error details in responses.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_upload_max_bytes(mut self, bytes: usize) -> Self {
        self.upload_max_bytes = bytes;
        self
    }

    pub fn with_public_url(mut self, url: Option<String>) -> Self {
        self.public_url = url;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// Settings in `config` override the matching fields of `state`.
pub fn create_router<R, T>(state: AppState<R, T>, config: RouterConfig) -> Router
where
    R: ImageRecords,
    T: RenditionTransformer,
{
    let state = state
        .with_cache_max_age(config.cache_max_age)
        .with_debug(config.debug)
        .with_public_url(config.public_url.clone());

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
        .route("/sizes", get(sizes_handler::<R, T>))
        .route("/image/{size}/{id}", get(rendition_handler::<R, T>))
        .route("/image/{id}", get(default_rendition_handler::<R, T>))
        .route("/upload", post(upload_handler::<R, T>))
        .route("/cache", delete(clear_cache_handler::<R, T>))
        .layer(DefaultBodyLimit::max(config.upload_max_bytes))
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
