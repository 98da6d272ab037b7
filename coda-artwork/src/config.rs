use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_DISK_BYTES: u64 = 250 * 1024 * 1024;
const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 30;

/// Configuration surface for the artwork cache and pipeline.
///
/// Consumed by the embedding application's own config loader; only the cache
/// root is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtworkCacheConfig {
    /// Directory holding cached artwork files and the index document.
    pub root: PathBuf,
    /// Disk budget in bytes. Zero disables the disk cache and purges on write.
    #[serde(default = "default_max_disk_bytes")]
    pub max_disk_bytes: u64,
    /// Timeout applied to remote artwork fetches, in seconds.
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,
}

impl ArtworkCacheConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_disk_bytes: DEFAULT_MAX_DISK_BYTES,
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
        }
    }

    pub fn with_max_disk_bytes(mut self, max_disk_bytes: u64) -> Self {
        self.max_disk_bytes = max_disk_bytes;
        self
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }
}

fn default_max_disk_bytes() -> u64 {
    DEFAULT_MAX_DISK_BYTES
}

fn default_network_timeout_secs() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::ArtworkCacheConfig;
    use std::path::PathBuf;

    #[test]
    fn defaults_fill_in_budget_and_timeout() {
        let config = ArtworkCacheConfig::new(PathBuf::from("/tmp/artwork"));

        assert_eq!(config.max_disk_bytes, 250 * 1024 * 1024);
        assert_eq!(config.network_timeout().as_secs(), 30);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: ArtworkCacheConfig =
            serde_json::from_str(r#"{"root": "/var/cache/coda"}"#).unwrap();

        assert_eq!(config.root, PathBuf::from("/var/cache/coda"));
        assert_eq!(config.max_disk_bytes, 250 * 1024 * 1024);
    }
}
