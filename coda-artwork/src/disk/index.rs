//! Durable metadata index for the on-disk artwork tier.
//!
//! The index, not the filesystem, is the source of truth for budget
//! accounting: `total_size_bytes` always equals the sum of entry sizes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub(crate) const INDEX_FILE: &str = "index.json";

/// Metadata for one cached file. Owned exclusively by [`ArtworkIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_name: String,
    pub size_bytes: u64,
    /// Unix millis, refreshed on every read and write of the entry.
    pub last_access: u64,
    /// Pixel bound reconstructing the file's storage directory.
    pub size_bucket: u32,
}

/// Map from cache-key string to entry metadata, persisted as one JSON
/// document and rewritten in full after every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtworkIndex {
    entries: HashMap<String, IndexEntry>,
    total_size_bytes: u64,
}

impl ArtworkIndex {
    /// Load the persisted document, falling back to an empty index when the
    /// file is absent or unparseable. Losing the index is recoverable; it
    /// must never prevent the cache from starting.
    pub fn load_or_default(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(err) => {
                warn!("artwork index unreadable at {}: {err}", path.display());
                return Self::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(index) => index,
            Err(err) => {
                warn!(
                    "artwork index unparseable at {}, starting empty: {err}",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn get(&self, cache_key: &str) -> Option<&IndexEntry> {
        self.entries.get(cache_key)
    }

    pub fn contains(&self, cache_key: &str) -> bool {
        self.entries.contains_key(cache_key)
    }

    /// Insert or replace an entry, debiting any prior size contribution so
    /// the running total counts each key exactly once.
    pub fn record(&mut self, cache_key: String, entry: IndexEntry) {
        if let Some(existing) = self.entries.get(&cache_key) {
            self.total_size_bytes = self.total_size_bytes.saturating_sub(existing.size_bytes);
        }
        self.total_size_bytes = self.total_size_bytes.saturating_add(entry.size_bytes);
        self.entries.insert(cache_key, entry);
    }

    /// Refresh `last_access`. Returns false when the key is absent.
    pub fn touch(&mut self, cache_key: &str, now_ms: u64) -> bool {
        match self.entries.get_mut(cache_key) {
            Some(entry) => {
                entry.last_access = now_ms;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, cache_key: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(cache_key)?;
        self.total_size_bytes = self.total_size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size_bytes = 0;
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    /// Atomically rewrite the persisted document (temp + rename), so a crash
    /// mid-write can never leave a truncated index behind. Persistence
    /// failures are logged and swallowed: the index rebuilds as empty.
    pub async fn persist(&self, path: &Path) {
        let doc = match serde_json::to_vec(self) {
            Ok(doc) => doc,
            Err(err) => {
                warn!("artwork index serialization failed: {err}");
                return;
            }
        };

        let tmp = path.with_file_name(format!("{INDEX_FILE}.tmp-{}", Uuid::new_v4().simple()));
        if let Err(err) = tokio::fs::write(&tmp, &doc).await {
            warn!("artwork index write failed at {}: {err}", tmp.display());
            return;
        }
        if let Err(err) = tokio::fs::rename(&tmp, path).await {
            warn!("artwork index rename failed at {}: {err}", path.display());
            let _ = tokio::fs::remove_file(&tmp).await;
        }
    }
}
