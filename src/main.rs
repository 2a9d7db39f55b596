//! Rendition Server - resized images on demand, cached on disk.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rendition_server::{
    config::{ClearConfig, Cli, Command, ServeConfig},
    record::{JsonRecordStore, Uploader},
    rendition::{CacheLifecycle, CacheStore, ImageTransformer, RenditionService, ServiceOptions},
    server::{create_router, AppState, RouterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Clear(config) => run_clear(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let catalog = match config.catalog() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_banner();

    info!("Configuration:");
    info!("  Source dir: {}", config.source_dir.display());
    info!("  Cache dir: {}", config.cache_dir.display());
    info!("  Records: {}", config.db_path.display());
    for spec in catalog.specs() {
        info!("  Size: {}", spec);
    }
    info!("  Default size: {}", config.default_size);
    info!("  JPEG quality: {}", config.jpeg_quality);
    match config.transform_timeout() {
        Some(timeout) => info!("  Transform timeout: {:?}", timeout),
        None => info!("  Transform timeout: none"),
    }
    info!("  Upload limit: {} bytes", config.upload_max_bytes);
    if config.debug {
        info!("  Debug: raw error details are returned to clients");
    }

    let records = match JsonRecordStore::open(&config.db_path).await {
        Ok(records) => Arc::new(records),
        Err(e) => {
            error!("Failed to open record store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let service = match RenditionService::start(
        Arc::clone(&records),
        ImageTransformer::with_quality(config.jpeg_quality),
        CacheStore::new(&config.cache_dir),
        catalog,
        ServiceOptions {
            default_size: config.default_size.clone(),
            transform_timeout: config.transform_timeout(),
        },
    )
    .await
    {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to prepare cache directories: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let uploader =
        Uploader::new(records, &config.source_dir).with_allow_types(&config.allow_types);

    let router = create_router(
        AppState::new(service, uploader),
        build_router_config(&config),
    );

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/sizes", addr);
    info!("    curl -F images=@photo.jpg http://{}/upload", addr);
    info!("    curl http://{}/image/thumb/<image_id> -o thumb.jpg", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██████╗ ███████╗███╗   ██╗██████╗ ██╗████████╗██╗ ██████╗ ███╗   ██╗");
    info!("██╔══██╗██╔════╝████╗  ██║██╔══██╗██║╚══██╔══╝██║██╔═══██╗████╗  ██║");
    info!("██████╔╝█████╗  ██╔██╗ ██║██║  ██║██║   ██║   ██║██║   ██║██╔██╗ ██║");
    info!("██╔══██╗██╔══╝  ██║╚██╗██║██║  ██║██║   ██║   ██║██║   ██║██║╚██╗██║");
    info!("██║  ██║███████╗██║ ╚████║██████╔╝██║   ██║   ██║╚██████╔╝██║ ╚████║");
    info!("╚═╝  ╚═╝╚══════╝╚═╝  ╚═══╝╚═════╝ ╚═╝   ╚═╝   ╚═╝ ╚═════╝ ╚═╝  ╚═══╝");
    info!("");
    info!("                              v{}", version);
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "rendition_server=debug,tower_http=debug"
    } else {
        "rendition_server=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing)
        .with_debug(config.debug)
        .with_upload_max_bytes(config.upload_max_bytes)
        .with_public_url(config.public_url.clone());

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Clear Command
// =============================================================================

async fn run_clear(config: ClearConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let catalog = match config.catalog() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let lifecycle = CacheLifecycle::new(&config.cache_dir, catalog);
    if let Err(e) = lifecycle.clear_all().await {
        error!("Failed to clear cache: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
