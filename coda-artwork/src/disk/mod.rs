//! On-disk artwork tier: raw image bytes plus a durable LRU index.
//!
//! Files live at `{root}/artwork/{size_bucket}/{file_name}`; the index is one
//! JSON document at `{root}/index.json`, rewritten atomically after every
//! mutation. Corruption found on read is healed by dropping the entry, never
//! surfaced to callers.

mod eviction;
mod index;

pub use index::{ArtworkIndex, IndexEntry};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ArtworkCacheConfig;
use crate::error::{ArtworkError, Result};
use crate::key::ArtworkKey;
use eviction::{CacheEntryInfo, plan_evictions};
use index::INDEX_FILE;

const ARTWORK_DIR: &str = "artwork";

/// Injected time source so LRU ordering is deterministic under test.
pub type ClockFn = Box<dyn Fn() -> u64 + Send + Sync>;

/// Persistent artwork store bounded by a byte budget.
///
/// All methods take `&mut self`: the index requires a single serialized
/// access path, which the pipeline provides by owning this behind one mutex.
pub struct ArtworkDiskCache {
    root: PathBuf,
    index_path: PathBuf,
    max_size_bytes: u64,
    index: ArtworkIndex,
    clock: ClockFn,
}

impl fmt::Debug for ArtworkDiskCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtworkDiskCache")
            .field("root", &self.root)
            .field("max_size_bytes", &self.max_size_bytes)
            .field("entries", &self.index.len())
            .field("total_size_bytes", &self.index.total_size_bytes())
            .finish()
    }
}

impl ArtworkDiskCache {
    pub fn open(config: &ArtworkCacheConfig) -> Result<Self> {
        Self::open_with_clock(config, Box::new(unix_ms_now))
    }

    /// As [`open`](Self::open), with an explicit time source. Intended for
    /// tests and diagnostics.
    pub fn open_with_clock(config: &ArtworkCacheConfig, clock: ClockFn) -> Result<Self> {
        std::fs::create_dir_all(&config.root)?;
        let index_path = config.root.join(INDEX_FILE);
        let index = ArtworkIndex::load_or_default(&index_path);

        Ok(Self {
            root: config.root.clone(),
            index_path,
            max_size_bytes: config.max_disk_bytes,
            index,
            clock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &ArtworkIndex {
        &self.index
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.index.total_size_bytes()
    }

    /// Index-only presence check; touches neither the filesystem nor the
    /// entry's access time.
    pub fn exists(&self, key: &ArtworkKey) -> bool {
        self.index.contains(&key.cache_key())
    }

    /// Look up cached bytes, validating the backing file.
    ///
    /// A missing, empty, or undecodable file is corruption: the entry is
    /// silently dropped and the lookup reports a miss. A valid read
    /// refreshes the entry's access time.
    pub async fn read(&mut self, key: &ArtworkKey) -> Result<Option<Vec<u8>>> {
        let cache_key = key.cache_key();
        let Some(entry) = self.index.get(&cache_key) else {
            return Ok(None);
        };
        let path = self.file_path(&entry.file_name, entry.size_bucket);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!("cached artwork unreadable at {}: {err}", path.display());
                self.purge_entry(&cache_key).await;
                return Ok(None);
            }
        };

        if bytes.is_empty() || image::load_from_memory(&bytes).is_err() {
            warn!("cached artwork corrupt at {}, dropping entry", path.display());
            self.purge_entry(&cache_key).await;
            return Ok(None);
        }

        let now_ms = (self.clock)();
        self.index.touch(&cache_key, now_ms);
        self.persist_index().await;
        Ok(Some(bytes))
    }

    /// Store bytes for a key, replacing any prior entry, then enforce the
    /// disk budget. The file lands via temp + rename, so no reader ever
    /// observes a partial write.
    pub async fn write(&mut self, key: &ArtworkKey, bytes: &[u8]) -> Result<()> {
        let file_name = key.file_name();
        let dir = self.bucket_dir(key.size_bucket());
        tokio::fs::create_dir_all(&dir).await?;
        write_atomic(&dir.join(&file_name), bytes).await?;

        let now_ms = (self.clock)();
        self.index.record(
            key.cache_key(),
            IndexEntry {
                file_name,
                size_bytes: bytes.len() as u64,
                last_access: now_ms,
                size_bucket: key.size_bucket(),
            },
        );
        self.persist_index().await;
        self.enforce_budget().await
    }

    /// Drop one entry. The file delete is best-effort; a missing file is not
    /// an error.
    pub async fn remove(&mut self, key: &ArtworkKey) -> Result<()> {
        let cache_key = key.cache_key();
        let Some(entry) = self.index.remove(&cache_key) else {
            return Ok(());
        };
        let path = self.file_path(&entry.file_name, entry.size_bucket);
        remove_file_best_effort(&path).await;
        self.persist_index().await;
        Ok(())
    }

    /// Full reset: the cache root is deleted and recreated empty. Not an
    /// eviction; unconditional regardless of current size.
    pub async fn invalidate_all(&mut self) -> Result<()> {
        self.index.clear();
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        info!("artwork disk cache cleared at {}", self.root.display());
        Ok(())
    }

    /// Synchronous budget enforcement, run after every successful write.
    ///
    /// A non-positive budget disables disk caching: every regular file under
    /// the root is purged, bypassing the index-driven plan.
    async fn enforce_budget(&mut self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return self.purge_all_files().await;
        }
        if self.index.total_size_bytes() <= self.max_size_bytes {
            return Ok(());
        }

        let snapshot: Vec<CacheEntryInfo> = self
            .index
            .entries()
            .map(|(cache_key, entry)| CacheEntryInfo {
                cache_key: cache_key.clone(),
                size_bytes: entry.size_bytes,
                last_access: entry.last_access,
            })
            .collect();
        let plan = plan_evictions(snapshot, self.max_size_bytes);
        let planned = plan.planned.len();

        for info in plan.planned {
            // The index is the source of truth for budget accounting: the
            // entry goes even when the file delete fails.
            if let Some(entry) = self.index.remove(&info.cache_key) {
                let path = self.file_path(&entry.file_name, entry.size_bucket);
                remove_file_best_effort(&path).await;
            }
        }
        self.persist_index().await;
        info!(
            "artwork disk cache evicted {planned} entries, {} bytes in use",
            self.index.total_size_bytes()
        );
        Ok(())
    }

    async fn purge_all_files(&mut self) -> Result<()> {
        self.index.clear();
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || remove_regular_files(&root))
            .await
            .map_err(|err| ArtworkError::Internal(format!("purge task failed: {err}")))??;
        Ok(())
    }

    async fn purge_entry(&mut self, cache_key: &str) {
        if let Some(entry) = self.index.remove(cache_key) {
            let path = self.file_path(&entry.file_name, entry.size_bucket);
            remove_file_best_effort(&path).await;
            self.persist_index().await;
        }
    }

    async fn persist_index(&self) {
        self.index.persist(&self.index_path).await;
    }

    fn bucket_dir(&self, size_bucket: u32) -> PathBuf {
        self.root.join(ARTWORK_DIR).join(size_bucket.to_string())
    }

    fn file_path(&self, file_name: &str, size_bucket: u32) -> PathBuf {
        self.bucket_dir(size_bucket).join(file_name)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(ARTWORK_DIR);
    let tmp = path.with_file_name(format!("{file_name}.tmp-{}", Uuid::new_v4().simple()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

async fn remove_file_best_effort(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("failed to delete cached artwork {}: {err}", path.display()),
    }
}

fn remove_regular_files(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            remove_regular_files(&entry.path())?;
        } else if let Err(err) = std::fs::remove_file(entry.path()) {
            warn!(
                "failed to purge cached artwork {}: {err}",
                entry.path().display()
            );
        }
    }
    Ok(())
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u128::from(u64::MAX)) as u64
}
