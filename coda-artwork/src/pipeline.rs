//! Fetch-on-miss orchestration over the two cache tiers.

use std::any::type_name_of_val;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::config::ArtworkCacheConfig;
use crate::disk::ArtworkDiskCache;
use crate::error::{ArtworkError, Result};
use crate::fetch::{ArtworkFetcher, FetchResponse, HttpArtworkFetcher};
use crate::key::{ArtworkKey, ArtworkVariant, OwnerKind};
use crate::memory::ArtworkMemoryCache;

/// Decoded artwork handed to consumers.
pub type ArtworkImage = Arc<DynamicImage>;

/// One artwork lookup: the cache key plus an optional remote source.
///
/// A request without a source URL only consults the caches; an owner may
/// legitimately lack artwork.
#[derive(Debug, Clone)]
pub struct ArtworkRequest {
    pub key: ArtworkKey,
    pub source_url: Option<Url>,
}

impl ArtworkRequest {
    pub fn new(key: ArtworkKey, source_url: Option<Url>) -> Self {
        Self { key, source_url }
    }
}

/// Tiered artwork resolver: memory, then disk, then remote fetch.
///
/// Construct one per media server at startup and share it by `Arc`; every
/// collaborator receives it explicitly rather than through a global.
pub struct ArtworkPipeline {
    memory: ArtworkMemoryCache,
    disk: Mutex<ArtworkDiskCache>,
    fetcher: Arc<dyn ArtworkFetcher>,
    // Per-key gate coalescing concurrent fetches; best-effort.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for ArtworkPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtworkPipeline")
            .field("memory_entries", &self.memory.len())
            .field("fetcher", &type_name_of_val(self.fetcher.as_ref()))
            .finish()
    }
}

impl ArtworkPipeline {
    pub fn new(config: &ArtworkCacheConfig, fetcher: Arc<dyn ArtworkFetcher>) -> Result<Self> {
        Ok(Self {
            memory: ArtworkMemoryCache::new(),
            disk: Mutex::new(ArtworkDiskCache::open(config)?),
            fetcher,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Pipeline wired to the stock HTTP fetcher using the configured timeout.
    pub fn with_http_fetcher(config: &ArtworkCacheConfig) -> Result<Self> {
        let fetcher = HttpArtworkFetcher::new(config.network_timeout())?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Resolve artwork for a request.
    ///
    /// `Ok(None)` means the owner has no artwork: nothing cached and no
    /// source to fetch from. On a fetch, both tiers are populated before
    /// this returns, so a subsequent (even concurrent) lookup observes the
    /// cached artwork.
    pub async fn load(&self, request: &ArtworkRequest) -> Result<Option<ArtworkImage>> {
        if let Some(image) = self.lookup_cached(&request.key).await? {
            return Ok(Some(image));
        }
        let Some(url) = request.source_url.as_ref() else {
            return Ok(None);
        };

        let cache_key = request.key.cache_key();
        let gate = self.fetch_gate(&cache_key).await;
        let guard = gate.lock().await;
        let result = self.fetch_through(&request.key, url).await;
        drop(guard);
        self.release_gate(&cache_key).await;
        result
    }

    /// Raw cached bytes from the disk tier, bypassing decode-to-memory.
    pub async fn cached_bytes(&self, key: &ArtworkKey) -> Result<Option<Vec<u8>>> {
        self.disk.lock().await.read(key).await
    }

    /// Cheap presence probe across both tiers; no fetch, no access refresh.
    pub async fn is_cached(&self, key: &ArtworkKey) -> bool {
        if self.memory.get(key).is_some() {
            return true;
        }
        self.disk.lock().await.exists(key)
    }

    /// Warm the caches for upcoming requests (scroll-ahead, queue lookahead).
    /// Detached and best-effort: failures are logged and dropped.
    pub fn prefetch(self: &Arc<Self>, requests: Vec<ArtworkRequest>) {
        if requests.is_empty() {
            return;
        }
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            for request in requests {
                if pipeline.is_cached(&request.key).await {
                    continue;
                }
                if let Err(err) = pipeline.load(&request).await {
                    debug!(
                        "artwork prefetch failed for {}: {err}",
                        request.key.cache_key()
                    );
                }
            }
        });
    }

    /// Drop one cached variant from both tiers. A later lookup simply
    /// refetches.
    pub async fn invalidate(&self, key: &ArtworkKey) -> Result<()> {
        self.memory.remove(key);
        self.disk.lock().await.remove(key).await
    }

    /// Drop every cached variant for an owner.
    pub async fn invalidate_owner(&self, owner_id: &str, owner_kind: OwnerKind) -> Result<()> {
        for variant in ArtworkVariant::ALL {
            self.invalidate(&ArtworkKey::new(owner_id, owner_kind, variant))
                .await?;
        }
        Ok(())
    }

    /// Full reset of both tiers; the disk root is recreated empty.
    pub async fn invalidate_all(&self) -> Result<()> {
        self.memory.clear();
        self.disk.lock().await.invalidate_all().await
    }

    async fn lookup_cached(&self, key: &ArtworkKey) -> Result<Option<ArtworkImage>> {
        if let Some(image) = self.memory.get(key) {
            return Ok(Some(image));
        }

        let bytes = self.disk.lock().await.read(key).await?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        match image::load_from_memory(&bytes) {
            Ok(decoded) => {
                let image = Arc::new(decoded);
                self.memory.put(key, Arc::clone(&image));
                Ok(Some(image))
            }
            Err(err) => {
                // The disk tier validated these bytes on read; failing here
                // means the file changed underneath us. Treat as a miss.
                warn!("disk artwork no longer decodes for {}: {err}", key.cache_key());
                Ok(None)
            }
        }
    }

    async fn fetch_through(&self, key: &ArtworkKey, url: &Url) -> Result<Option<ArtworkImage>> {
        // A concurrent fetch may have landed while we waited on the gate.
        if let Some(image) = self.lookup_cached(key).await? {
            return Ok(Some(image));
        }

        let response = self.fetcher.fetch(url).await?;
        let bytes = validate_response(key, response)?;
        let decoded = image::load_from_memory(&bytes).map_err(|err| {
            debug!("fetched artwork does not decode for {}: {err}", key.cache_key());
            ArtworkError::InvalidResponse
        })?;
        let image = Arc::new(decoded);

        self.disk.lock().await.write(key, &bytes).await?;
        self.memory.put(key, Arc::clone(&image));
        debug!("fetched and cached artwork for {}", key.cache_key());
        Ok(Some(image))
    }

    async fn fetch_gate(&self, cache_key: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(cache_key.to_string()).or_default())
    }

    async fn release_gate(&self, cache_key: &str) {
        self.in_flight.lock().await.remove(cache_key);
    }
}

fn validate_response(key: &ArtworkKey, response: FetchResponse) -> Result<Vec<u8>> {
    match response.status {
        200..=299 => {}
        401 => return Err(ArtworkError::AuthExpired),
        404 => return Err(ArtworkError::NotFound(key.owner_id().to_string())),
        504 => return Err(ArtworkError::Timeout),
        status => {
            return Err(ArtworkError::Api {
                status,
                message: format!("artwork fetch failed with status {status}"),
            });
        }
    }

    if response.body.is_empty() {
        return Err(ArtworkError::InvalidResponse);
    }
    Ok(response.body)
}
