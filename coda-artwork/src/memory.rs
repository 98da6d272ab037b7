use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use image::DynamicImage;

use crate::key::ArtworkKey;

/// Process-lifetime cache of decoded artwork, keyed by cache-key string.
///
/// Carries no eviction policy of its own: the embedding app may `clear` it
/// wholesale under memory pressure, so entries can vanish at any time and
/// every read-through path must tolerate a miss immediately after a `put`.
#[derive(Debug, Clone)]
pub struct ArtworkMemoryCache {
    cache: Arc<Mutex<HashMap<String, Arc<DynamicImage>>>>,
}

impl Default for ArtworkMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtworkMemoryCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, key: &ArtworkKey) -> Option<Arc<DynamicImage>> {
        self.cache.lock().unwrap().get(&key.cache_key()).cloned()
    }

    /// Unconditional overwrite.
    pub fn put(&self, key: &ArtworkKey, image: Arc<DynamicImage>) {
        self.cache.lock().unwrap().insert(key.cache_key(), image);
    }

    pub fn remove(&self, key: &ArtworkKey) {
        self.cache.lock().unwrap().remove(&key.cache_key());
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}
