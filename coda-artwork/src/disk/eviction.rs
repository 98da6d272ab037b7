//! LRU eviction planning for the disk tier.
//!
//! Planning is pure so it can be tested without a filesystem; the disk cache
//! executes the plan and keeps the index authoritative even when individual
//! file deletes fail.

/// Snapshot of one index entry considered for eviction.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntryInfo {
    pub cache_key: String,
    pub size_bytes: u64,
    pub last_access: u64,
}

#[derive(Debug, Default)]
pub(crate) struct EvictionPlan {
    /// Entries to remove, least recently used first.
    pub planned: Vec<CacheEntryInfo>,
    pub total_bytes_before: u64,
    pub total_bytes_after: u64,
}

/// Plan removals, oldest `last_access` first, until the total fits under
/// `max_bytes`. Ties break by cache-key ordering so plans are reproducible.
pub(crate) fn plan_evictions(mut entries: Vec<CacheEntryInfo>, max_bytes: u64) -> EvictionPlan {
    let mut plan = EvictionPlan::default();

    let mut total_bytes: u64 = entries.iter().map(|e| e.size_bytes).sum();
    plan.total_bytes_before = total_bytes;

    if total_bytes > max_bytes {
        entries.sort_by(|a, b| {
            a.last_access
                .cmp(&b.last_access)
                .then_with(|| a.cache_key.cmp(&b.cache_key))
        });
        for entry in entries {
            if total_bytes <= max_bytes {
                break;
            }
            total_bytes = total_bytes.saturating_sub(entry.size_bytes);
            plan.planned.push(entry);
        }
    }

    plan.total_bytes_after = total_bytes;
    plan
}
