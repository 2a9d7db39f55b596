//! HTTP request handlers for the rendition API.
//!
//! # Endpoints
//!
//! - `GET /` - Package information
//! - `GET /health` - Health check
//! - `GET /sizes` - The size catalog
//! - `GET /image/{size}/{id}` - Serve a rendition
//! - `GET /image/{id}` - Serve the default-size rendition
//! - `POST /upload` - Upload originals (multipart field `images`)
//! - `DELETE /cache` - Clear every cached rendition

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{RenditionError, UploadError};
use crate::record::{ImageRecord, ImageRecords, UploadFile, Uploader};
use crate::rendition::{
    ImageTransformer, Rendition, RenditionService, RenditionTransformer, SizeCatalog,
};

/// Multipart field that carries uploaded files.
pub const UPLOAD_FIELD: &str = "images";

/// Message returned for server errors outside debug mode.
pub const GENERIC_ERROR_MESSAGE: &str = "An error encountered while processing images";

/// Response header reporting whether a rendition came from the cache.
pub const CACHE_HIT_HEADER: &str = "x-rendition-cache-hit";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers.
pub struct AppState<R: ImageRecords, T: RenditionTransformer = ImageTransformer> {
    /// Rendition coordinator
    pub service: RenditionService<R, T>,

    /// Upload pipeline writing into the same record store
    pub uploader: Arc<Uploader<R>>,

    /// Cache-Control max-age in seconds for rendition responses
    pub cache_max_age: u32,

    /// Return raw error details instead of the generic message
    pub debug: bool,

    /// Base URL used to build absolute links in upload responses
    pub public_url: Option<String>,
}

impl<R: ImageRecords, T: RenditionTransformer> AppState<R, T> {
    pub fn new(service: RenditionService<R, T>, uploader: Uploader<R>) -> Self {
        Self {
            service,
            uploader: Arc::new(uploader),
            cache_max_age: 86400,
            debug: false,
            public_url: None,
        }
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the public base URL. A trailing slash is dropped.
    pub fn with_public_url(mut self, url: Option<String>) -> Self {
        self.public_url = url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        self
    }

    /// URL of one rendition.
    ///
    /// Absolute only when `absolute` is set and a public URL is configured.
    pub fn rendition_url(&self, size: &str, image_id: &str, absolute: bool) -> String {
        let base = match &self.public_url {
            Some(url) if absolute => url.as_str(),
            _ => "",
        };
        format!("{}/image/{}/{}", base, size, image_id)
    }
}

impl<R: ImageRecords, T: RenditionTransformer> Clone for AppState<R, T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            uploader: Arc::clone(&self.uploader),
            cache_max_age: self.cache_max_age,
            debug: self.debug,
            public_url: self.public_url.clone(),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for uploads.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQueryParams {
    /// Name used in place of the client file name when building storage names
    #[serde(default)]
    pub name: Option<String>,

    /// `1` asks for absolute rendition URLs
    #[serde(default)]
    pub pretier: Option<String>,
}

impl UploadQueryParams {
    pub fn absolute_urls(&self) -> bool {
        self.pretier.as_deref() == Some("1")
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "unknown_size")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Package information served at `/`.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub description: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    pub license: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Response from `DELETE /cache`.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub sizes: SizeCatalog,
}

/// One stored upload.
#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub id: String,

    /// Storage file name
    pub name: String,

    /// Original size in bytes
    pub size: u64,

    /// Rendition URL per size name
    pub urls: BTreeMap<String, String>,
}

/// Response from `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub images: Vec<UploadedImage>,

    /// Configured public URL, if any
    pub host: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// HTTP status and error type identifier for a rendition failure.
pub fn rendition_status(err: &RenditionError) -> (StatusCode, &'static str) {
    match err {
        RenditionError::UnknownSize { .. } => (StatusCode::NOT_FOUND, "unknown_size"),
        RenditionError::ImageNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        RenditionError::TransformFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "transform_failed")
        }
        RenditionError::TransformTimeout { .. } => {
            (StatusCode::GATEWAY_TIMEOUT, "transform_timeout")
        }
        RenditionError::CacheWriteFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "cache_write_failed")
        }
        RenditionError::CacheReadFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "cache_read_failed")
        }
        RenditionError::SourceUnavailable { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "source_unavailable")
        }
        RenditionError::RecordStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "record_store_error"),
    }
}

/// HTTP status and error type identifier for an upload failure.
pub fn upload_status(err: &UploadError) -> (StatusCode, &'static str) {
    match err {
        UploadError::UnsupportedType { .. } => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_type")
        }
        UploadError::Invalid(_) => (StatusCode::BAD_REQUEST, "invalid_upload"),
        UploadError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        UploadError::RecordStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "record_store_error"),
    }
}

/// Error returned from handlers.
///
/// Carries the full detail for logging. Outside debug mode, server errors
/// reach the client only as [`GENERIC_ERROR_MESSAGE`].
#[derive(Debug)]
pub struct HandlerError {
    status: StatusCode,
    error_type: &'static str,
    message: String,
    debug: bool,
}

impl HandlerError {
    pub fn new(
        status: StatusCode,
        error_type: &'static str,
        message: impl Into<String>,
        debug: bool,
    ) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
            debug,
        }
    }

    pub fn rendition(err: RenditionError, debug: bool) -> Self {
        let (status, error_type) = rendition_status(&err);
        Self::new(status, error_type, err.to_string(), debug)
    }

    pub fn upload(err: UploadError, debug: bool) -> Self {
        let (status, error_type) = upload_status(&err);
        Self::new(status, error_type, err.to_string(), debug)
    }

    fn multipart(err: MultipartError, debug: bool) -> Self {
        let status = err.status();
        let error_type = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "invalid_upload"
        };
        Self::new(status, error_type, err.body_text(), debug)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Message as the client will see it.
    pub fn public_message(&self) -> &str {
        if self.status.is_server_error() && !self.debug {
            GENERIC_ERROR_MESSAGE
        } else {
            &self.message
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status;
        let error_type = self.error_type;

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self.message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                self.message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                self.message
            );
        }

        let error_response =
            ErrorResponse::with_status(error_type, self.public_message(), status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle package information requests.
///
/// # Endpoint
///
/// `GET /`
pub async fn info_handler() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        authors: env!("CARGO_PKG_AUTHORS")
            .split(':')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect(),
        license: env!("CARGO_PKG_LICENSE").to_string(),
    })
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle size catalog requests.
///
/// # Endpoint
///
/// `GET /sizes`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "full": {"mode": "original"},
///   "thumb": {"mode": "crop", "width": 100, "height": 100}
/// }
/// ```
pub async fn sizes_handler<R, T>(State(state): State<AppState<R, T>>) -> Json<SizeCatalog>
where
    R: ImageRecords,
    T: RenditionTransformer,
{
    Json(state.service.catalog().clone())
}

/// Handle rendition requests.
///
/// # Endpoint
///
/// `GET /image/{size}/{id}`
///
/// # Response
///
/// - `200 OK`: Rendition bytes
/// - `404 Not Found`: Unknown size or image
/// - `500 Internal Server Error`: Transform or cache failure
/// - `504 Gateway Timeout`: Transform took too long
///
/// # Headers
///
/// - `Content-Type: image/*` (detected from the bytes)
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Rendition-Cache-Hit: true|false`
pub async fn rendition_handler<R, T>(
    State(state): State<AppState<R, T>>,
    Path((size, image_id)): Path<(String, String)>,
) -> Result<Response, HandlerError>
where
    R: ImageRecords,
    T: RenditionTransformer,
{
    let rendition = state
        .service
        .get_rendition(&image_id, &size)
        .await
        .map_err(|e| HandlerError::rendition(e, state.debug))?;

    Ok(rendition_response(rendition, state.cache_max_age))
}

/// Handle default-size rendition requests.
///
/// # Endpoint
///
/// `GET /image/{id}`
///
/// Same as `GET /image/{default_size}/{id}`.
pub async fn default_rendition_handler<R, T>(
    State(state): State<AppState<R, T>>,
    Path(image_id): Path<String>,
) -> Result<Response, HandlerError>
where
    R: ImageRecords,
    T: RenditionTransformer,
{
    let rendition = state
        .service
        .get_default_rendition(&image_id)
        .await
        .map_err(|e| HandlerError::rendition(e, state.debug))?;

    Ok(rendition_response(rendition, state.cache_max_age))
}

fn rendition_response(rendition: Rendition, cache_max_age: u32) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, rendition.content_type.to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", cache_max_age),
            ),
            (
                HeaderName::from_static(CACHE_HIT_HEADER),
                rendition.cache_hit.to_string(),
            ),
        ],
        rendition.data,
    )
        .into_response()
}

/// Handle cache clear requests.
///
/// # Endpoint
///
/// `DELETE /cache`
///
/// # Response
///
/// `200 OK` with the catalog whose directories were recreated:
/// ```json
/// {"sizes": {"full": {"mode": "original"}}}
/// ```
pub async fn clear_cache_handler<R, T>(
    State(state): State<AppState<R, T>>,
) -> Result<Json<ClearResponse>, HandlerError>
where
    R: ImageRecords,
    T: RenditionTransformer,
{
    let catalog = state
        .service
        .clear_cache()
        .await
        .map_err(|e| HandlerError::rendition(e, state.debug))?;

    Ok(Json(ClearResponse {
        sizes: catalog.as_ref().clone(),
    }))
}

/// Handle uploads.
///
/// # Endpoint
///
/// `POST /upload?name={display name}&pretier=1`
///
/// `pretier=1` makes the returned URLs absolute when a public URL is configured.
///
/// Every part named `images` is stored; other parts are ignored.
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "images": [
///     {"id": "...", "name": "1700000000000-cat.png", "size": 1234,
///      "urls": {"thumb": "/image/thumb/..."}}
///   ],
///   "host": null
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed multipart body, empty file, or no `images` part
/// - `413 Payload Too Large`: Body exceeds the upload limit
/// - `415 Unsupported Media Type`: Content type not in the allow list
/// - `500 Internal Server Error`: Original or record could not be stored
pub async fn upload_handler<R, T>(
    State(state): State<AppState<R, T>>,
    Query(query): Query<UploadQueryParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HandlerError>
where
    R: ImageRecords,
    T: RenditionTransformer,
{
    let mut records: Vec<ImageRecord> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HandlerError::multipart(e, state.debug))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| HandlerError::multipart(e, state.debug))?;

        let record = state
            .uploader
            .store(
                UploadFile {
                    file_name,
                    content_type,
                    data,
                },
                query.name.as_deref(),
            )
            .await
            .map_err(|e| HandlerError::upload(e, state.debug))?;

        records.push(record);
    }

    if records.is_empty() {
        return Err(HandlerError::upload(
            UploadError::Invalid(format!("no files in field '{}'", UPLOAD_FIELD)),
            state.debug,
        ));
    }

    info!(count = records.len(), "Upload complete");

    let absolute = query.absolute_urls();
    let catalog = state.service.catalog();
    let images = records
        .into_iter()
        .map(|record| UploadedImage {
            urls: catalog
                .names()
                .map(|size| (size.to_string(), state.rendition_url(size, &record.id, absolute)))
                .collect(),
            id: record.id,
            name: record.name,
            size: record.size,
        })
        .collect();

    Ok(Json(UploadResponse {
        images,
        host: state.public_url.clone(),
    }))
}

// =============================================================================
// Tests
// =============================================================================
