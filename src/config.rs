//! Configuration management for the rendition server.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `RENDITION_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use rendition_server::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Clear(config) => println!("Clearing {}", config.cache_dir.display()),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RENDITION_HOST` - Server bind address (default: 0.0.0.0)
//! - `RENDITION_PORT` - Server port (default: 3000)
//! - `RENDITION_SOURCE_DIR` - Directory for uploaded originals (default: ./data/source)
//! - `RENDITION_CACHE_DIR` - Rendition cache root (default: ./data/cache)
//! - `RENDITION_DB_PATH` - JSON record store (default: ./data/db.json)
//! - `RENDITION_SIZES` - Size catalog, comma-separated `NAME=WxH[:fit|crop]` or `NAME=original`
//! - `RENDITION_DEFAULT_SIZE` - Size served by `/image/{id}` (default: full)
//! - `RENDITION_JPEG_QUALITY` - JPEG quality for resized renditions (default: 85)
//! - `RENDITION_TRANSFORM_TIMEOUT_SECS` - Transform timeout (default: none)
//! - `RENDITION_UPLOAD_MAX_BYTES` - Request body limit (default: 10 MiB)
//! - `RENDITION_ALLOW_TYPES` - Accepted upload content types
//! - `RENDITION_PUBLIC_URL` - Base URL for links in upload responses
//! - `RENDITION_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 86400)
//! - `RENDITION_CORS_ORIGINS` - Allowed CORS origins (default: any)
//! - `RENDITION_DEBUG` - Return raw error details (default: false)

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::rendition::{
    is_valid_quality, SizeCatalog, DEFAULT_JPEG_QUALITY, DEFAULT_SIZE_NAME,
};
use crate::server::{DEFAULT_CACHE_MAX_AGE, DEFAULT_UPLOAD_MAX_BYTES};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default directory for uploaded originals.
pub const DEFAULT_SOURCE_DIR: &str = "./data/source";

/// Default rendition cache root.
pub const DEFAULT_CACHE_DIR: &str = "./data/cache";

/// Default record store path.
pub const DEFAULT_DB_PATH: &str = "./data/db.json";

/// Default size catalog, comma-separated.
pub const DEFAULT_SIZES_ARG: &str = "thumb=100x100:crop,medium=640x640,full=original";

/// Default accepted upload types, comma-separated.
pub const DEFAULT_ALLOW_TYPES_ARG: &str = "image/jpeg,image/png,image/gif,image/webp";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Rendition Server - resized images on demand, cached on disk.
#[derive(Parser, Debug, Clone)]
#[command(name = "rendition-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Remove every cached rendition and recreate the size directories.
    Clear(ClearConfig),
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "RENDITION_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RENDITION_PORT")]
    pub port: u16,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory where uploaded originals are stored.
    #[arg(long, default_value = DEFAULT_SOURCE_DIR, env = "RENDITION_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Root directory of the rendition cache.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "RENDITION_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// JSON file holding image records.
    #[arg(long, default_value = DEFAULT_DB_PATH, env = "RENDITION_DB_PATH")]
    pub db_path: PathBuf,

    // =========================================================================
    // Rendition Configuration
    // =========================================================================
    /// Size catalog (comma-separated `NAME=WxH[:fit|crop]` or `NAME=original`).
    #[arg(
        long,
        default_value = DEFAULT_SIZES_ARG,
        env = "RENDITION_SIZES",
        value_delimiter = ','
    )]
    pub sizes: Vec<String>,

    /// Size served by `GET /image/{id}`.
    #[arg(long, default_value = DEFAULT_SIZE_NAME, env = "RENDITION_DEFAULT_SIZE")]
    pub default_size: String,

    /// JPEG quality for resized renditions (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "RENDITION_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Abort transforms that take longer than this many seconds.
    #[arg(long, env = "RENDITION_TRANSFORM_TIMEOUT_SECS")]
    pub transform_timeout_secs: Option<u64>,

    // =========================================================================
    // Upload Configuration
    // =========================================================================
    /// Largest accepted request body in bytes.
    #[arg(long, default_value_t = DEFAULT_UPLOAD_MAX_BYTES, env = "RENDITION_UPLOAD_MAX_BYTES")]
    pub upload_max_bytes: usize,

    /// Accepted upload content types (comma-separated).
    #[arg(
        long,
        default_value = DEFAULT_ALLOW_TYPES_ARG,
        env = "RENDITION_ALLOW_TYPES",
        value_delimiter = ','
    )]
    pub allow_types: Vec<String>,

    /// Base URL used for absolute links in upload responses.
    #[arg(long, env = "RENDITION_PUBLIC_URL")]
    pub public_url: Option<String>,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "RENDITION_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "RENDITION_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Return raw error details to clients instead of a generic message.
    #[arg(long, default_value_t = false, env = "RENDITION_DEBUG")]
    pub debug: bool,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let catalog = self.catalog()?;

        if !catalog.contains(&self.default_size) {
            return Err(format!(
                "default_size '{}' is not in the size catalog (known: {})",
                self.default_size,
                catalog.names().collect::<Vec<_>>().join(", ")
            ));
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.upload_max_bytes == 0 {
            return Err("upload_max_bytes must be greater than 0".to_string());
        }

        if self.transform_timeout_secs == Some(0) {
            return Err("transform_timeout_secs must be greater than 0".to_string());
        }

        if self.allow_types.iter().all(|t| t.trim().is_empty()) {
            return Err("allow_types must name at least one content type".to_string());
        }

        check_cache_isolation(&self.cache_dir, &self.source_dir, &self.db_path)
    }

    /// Parse the size catalog.
    pub fn catalog(&self) -> Result<SizeCatalog, String> {
        SizeCatalog::parse(&self.sizes).map_err(|e| e.to_string())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn transform_timeout(&self) -> Option<Duration> {
        self.transform_timeout_secs.map(Duration::from_secs)
    }
}

// =============================================================================
// Clear
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ClearConfig {
    /// Root directory of the rendition cache.
    #[arg(long, default_value = DEFAULT_CACHE_DIR, env = "RENDITION_CACHE_DIR")]
    pub cache_dir: PathBuf,

    /// Directory of uploaded originals, which the clear must not reach.
    #[arg(long, default_value = DEFAULT_SOURCE_DIR, env = "RENDITION_SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Record store file, which the clear must not reach.
    #[arg(long, default_value = DEFAULT_DB_PATH, env = "RENDITION_DB_PATH")]
    pub db_path: PathBuf,

    /// Size catalog whose directories are recreated after the clear.
    #[arg(
        long,
        default_value = DEFAULT_SIZES_ARG,
        env = "RENDITION_SIZES",
        value_delimiter = ','
    )]
    pub sizes: Vec<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ClearConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.catalog()?;
        check_cache_isolation(&self.cache_dir, &self.source_dir, &self.db_path)
    }

    pub fn catalog(&self) -> Result<SizeCatalog, String> {
        SizeCatalog::parse(&self.sizes).map_err(|e| e.to_string())
    }
}

// =============================================================================
// Path Checks
// =============================================================================

/// Reject layouts where clearing the cache would delete originals or records.
///
/// The cache root may not equal, contain or sit inside the source directory,
/// and may not contain the record store.
pub fn check_cache_isolation(cache_dir: &Path, source_dir: &Path, db_path: &Path) -> Result<(), String> {
    let cache = normalize_path(cache_dir);
    let source = normalize_path(source_dir);
    let db = normalize_path(db_path);

    if source.starts_with(&cache) || cache.starts_with(&source) {
        return Err(format!(
            "cache_dir '{}' overlaps source_dir '{}'",
            cache_dir.display(),
            source_dir.display()
        ));
    }

    if db.starts_with(&cache) {
        return Err(format!(
            "db_path '{}' is inside cache_dir '{}'",
            db_path.display(),
            cache_dir.display()
        ));
    }

    Ok(())
}

/// Absolute, lexically normalized form of `path`. Symlinks are not resolved.
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

// =============================================================================
// Tests
// =============================================================================
