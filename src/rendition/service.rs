//! Rendition service: the request-facing cache coordinator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        RenditionService                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                     get_rendition()                        │  │
//! │  │  1. Validate size      4. Read cached file (hit → return)  │  │
//! │  │  2. Validate id        5. Join or lead the generation      │  │
//! │  │  3. Look up record                                         │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │          │                    │                     │            │
//! │          ▼                    ▼                     ▼            │
//! │   ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐   │
//! │   │ ImageRecords │    │  CacheStore  │    │ RenditionTrans-  │   │
//! │   └──────────────┘    └──────────────┘    │ former           │   │
//! │                                           └──────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Generation
//!
//! A miss registers an in-flight entry keyed by `(size, id)`. The first caller
//! spawns a detached task that loads the original, transforms it on the
//! blocking pool and writes it into the store. Every caller for the same key,
//! the first one included, waits on the entry and receives the same result.
//! Dropping a request future never cancels the task.
//!
//! Generations hold the shared side of a clear gate; [`RenditionService::clear_cache`]
//! takes the exclusive side, so a clear waits for running generations and
//! new ones queue behind it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

use crate::error::{RenditionError, StoreError, TransformError};
use crate::record::{ImageRecord, ImageRecords};

use super::catalog::{SizeCatalog, SizeSpec, DEFAULT_SIZE_NAME};
use super::lifecycle::CacheLifecycle;
use super::store::{validate_key, CacheStore};
use super::transform::{detect_content_type, ImageTransformer, RenditionTransformer};

// =============================================================================
// Rendition
// =============================================================================

/// A rendition ready to be served.
#[derive(Debug, Clone)]
pub struct Rendition {
    /// Encoded image bytes
    pub data: Bytes,

    /// MIME type detected from the bytes
    pub content_type: &'static str,

    /// Size name this rendition was produced for
    pub size: String,

    /// Whether the bytes came straight from the cache
    pub cache_hit: bool,
}

impl Rendition {
    fn new(data: Bytes, size: &str, cache_hit: bool) -> Self {
        Self {
            content_type: detect_content_type(&data),
            data,
            size: size.to_string(),
            cache_hit,
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Tunables for [`RenditionService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Size served when the request names none
    pub default_size: String,

    /// Upper bound on one transform; `None` waits forever
    pub transform_timeout: Option<Duration>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_SIZE_NAME.to_string(),
            transform_timeout: None,
        }
    }
}

// =============================================================================
// In-flight generations
// =============================================================================

type GenerationKey = (String, String);
type GenerationResult = Result<Bytes, RenditionError>;

/// One running generation and the callers waiting on it.
struct InFlight {
    notify: Notify,
    result: Mutex<Option<GenerationResult>>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            result: Mutex::new(None),
        }
    }

    /// Wait until the result is published.
    ///
    /// The notification is armed before the result is checked, so a publish
    /// that lands between the check and the await still wakes us.
    async fn wait(&self) -> GenerationResult {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.result.lock().await.as_ref() {
                return result.clone();
            }

            notified.await;
        }
    }
}

// =============================================================================
// RenditionService
// =============================================================================

struct Shared<R, T> {
    records: Arc<R>,
    transformer: Arc<T>,
    store: CacheStore,
    lifecycle: CacheLifecycle,
    catalog: Arc<SizeCatalog>,
    options: ServiceOptions,

    /// Generations in progress, keyed by `(size, image id)`
    in_flight: Mutex<HashMap<GenerationKey, Arc<InFlight>>>,

    /// Read side held by generations, write side by clears
    gate: RwLock<()>,
}

/// Serves renditions from the cache, generating them on first request.
///
/// Cheap to clone; clones share the in-flight table and the clear gate.
pub struct RenditionService<R: ImageRecords, T: RenditionTransformer = ImageTransformer> {
    inner: Arc<Shared<R, T>>,
}

impl<R: ImageRecords, T: RenditionTransformer> Clone for RenditionService<R, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ImageRecords, T: RenditionTransformer> RenditionService<R, T> {
    /// Build the service and make sure every size directory exists.
    ///
    /// Fails with [`RenditionError::UnknownSize`] if the default size is not
    /// in the catalog.
    pub async fn start(
        records: Arc<R>,
        transformer: T,
        store: CacheStore,
        catalog: Arc<SizeCatalog>,
        options: ServiceOptions,
    ) -> Result<Self, RenditionError> {
        if !catalog.contains(&options.default_size) {
            return Err(RenditionError::UnknownSize {
                size: options.default_size,
            });
        }

        let lifecycle = CacheLifecycle::new(store.root(), Arc::clone(&catalog));
        lifecycle
            .ensure_catalog_directories()
            .await
            .map_err(|e| RenditionError::CacheWriteFailed {
                message: e.to_string(),
            })?;

        info!(
            cache_root = %store.root().display(),
            sizes = catalog.len(),
            default_size = %options.default_size,
            "Rendition service started"
        );

        Ok(Self {
            inner: Arc::new(Shared {
                records,
                transformer: Arc::new(transformer),
                store,
                lifecycle,
                catalog,
                options,
                in_flight: Mutex::new(HashMap::new()),
                gate: RwLock::new(()),
            }),
        })
    }

    /// Get the rendition of `image_id` at `size`, generating it on a miss.
    pub async fn get_rendition(
        &self,
        image_id: &str,
        size: &str,
    ) -> Result<Rendition, RenditionError> {
        let spec = self
            .inner
            .catalog
            .get(size)
            .ok_or_else(|| RenditionError::UnknownSize {
                size: size.to_string(),
            })?;

        if validate_key(image_id).is_err() {
            return Err(RenditionError::ImageNotFound {
                image_id: image_id.to_string(),
            });
        }

        let record = self
            .inner
            .records
            .lookup(image_id)
            .await?
            .ok_or_else(|| RenditionError::ImageNotFound {
                image_id: image_id.to_string(),
            })?;

        if let Some(data) = self.inner.read_cached(size, image_id).await? {
            debug!(image_id = image_id, size = size, "Rendition cache hit");
            return Ok(Rendition::new(data, size, true));
        }

        debug!(image_id = image_id, size = size, "Rendition cache miss");
        let data = self.generate(record, spec.clone()).await?;
        Ok(Rendition::new(data, size, false))
    }

    /// Get the rendition at the configured default size.
    pub async fn get_default_rendition(&self, image_id: &str) -> Result<Rendition, RenditionError> {
        self.get_rendition(image_id, &self.inner.options.default_size)
            .await
    }

    /// Join the in-flight generation for the key, or start one.
    async fn generate(&self, record: ImageRecord, spec: SizeSpec) -> GenerationResult {
        let key: GenerationKey = (spec.name.clone(), record.id.clone());

        let entry = {
            let mut in_flight = self.inner.in_flight.lock().await;

            if let Some(entry) = in_flight.get(&key) {
                debug!(image_id = %key.1, size = %key.0, "Joining in-flight generation");
                Arc::clone(entry)
            } else {
                let entry = Arc::new(InFlight::new());
                in_flight.insert(key.clone(), Arc::clone(&entry));
                drop(in_flight);

                let shared = Arc::clone(&self.inner);
                let leader = Arc::clone(&entry);
                tokio::spawn(async move {
                    let result = shared.produce(&record, &spec).await;
                    shared.publish(&key, &leader, result).await;
                });

                entry
            }
        };

        entry.wait().await
    }

    /// Remove every cached rendition and recreate the size directories.
    ///
    /// Waits for running generations; new ones wait for the clear.
    pub async fn clear_cache(&self) -> Result<Arc<SizeCatalog>, RenditionError> {
        let _exclusive = self.inner.gate.write().await;

        self.inner
            .lifecycle
            .clear_all()
            .await
            .map_err(|e| RenditionError::CacheWriteFailed {
                message: e.to_string(),
            })?;

        Ok(Arc::clone(&self.inner.catalog))
    }

    pub fn catalog(&self) -> &SizeCatalog {
        &self.inner.catalog
    }

    pub fn default_size(&self) -> &str {
        &self.inner.options.default_size
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    /// Number of generations currently running.
    pub async fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }
}

impl<R: ImageRecords, T: RenditionTransformer> Shared<R, T> {
    /// Read a cached rendition, mapping a miss to `None`.
    async fn read_cached(&self, size: &str, image_id: &str) -> Result<Option<Bytes>, RenditionError> {
        match self.store.read(size, image_id).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(RenditionError::CacheReadFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Produce the rendition bytes and store them. Runs in the detached task.
    async fn produce(&self, record: &ImageRecord, spec: &SizeSpec) -> GenerationResult {
        let _shared = self.gate.read().await;

        // An earlier generation may have finished after the caller's miss.
        if let Some(data) = self.read_cached(&spec.name, &record.id).await? {
            return Ok(data);
        }

        let source = self.records.read_original(record).await.map_err(|e| {
            RenditionError::SourceUnavailable {
                image_id: record.id.clone(),
                message: e.to_string(),
            }
        })?;

        let data = self.transform(source, spec.clone()).await?;

        self.store
            .write_atomic(&spec.name, &record.id, data.clone())
            .await
            .map_err(|e| RenditionError::CacheWriteFailed {
                message: e.to_string(),
            })?;

        info!(
            image_id = %record.id,
            size = %spec.name,
            bytes = data.len(),
            "Rendition generated"
        );
        Ok(data)
    }

    /// Run the transformer on the blocking pool, applying the timeout.
    async fn transform(&self, source: Bytes, spec: SizeSpec) -> GenerationResult {
        let transformer = Arc::clone(&self.transformer);
        let task = tokio::task::spawn_blocking(move || transformer.transform(&source, &spec));

        let joined = match self.options.transform_timeout {
            Some(after) => tokio::time::timeout(after, task)
                .await
                .map_err(|_| RenditionError::TransformTimeout { after })?,
            None => task.await,
        };

        let result = joined.map_err(|e| {
            RenditionError::TransformFailed(TransformError::EncodeError {
                message: format!("transform task failed: {}", e),
            })
        })?;

        Ok(result?)
    }

    /// Publish the result, retire the entry and wake every waiter.
    async fn publish(&self, key: &GenerationKey, entry: &InFlight, result: GenerationResult) {
        if let Err(ref e) = result {
            warn!(image_id = %key.1, size = %key.0, error = %e, "Rendition generation failed");
        }

        *entry.result.lock().await = Some(result);
        self.in_flight.lock().await.remove(key);
        entry.notify.notify_waiters();
    }
}

// =============================================================================
// Tests
// =============================================================================
