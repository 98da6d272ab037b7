use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use coda_artwork::{
    ArtworkCacheConfig, ArtworkDiskCache, ArtworkKey, ArtworkVariant, OwnerKind,
};
use tempfile::tempdir;

fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        2,
        2,
        image::Rgba([180, 40, 40, 255]),
    ));
    let mut out = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn sequence_clock_from(start: u64) -> Box<dyn Fn() -> u64 + Send + Sync> {
    let counter = Arc::new(AtomicU64::new(start));
    Box::new(move || counter.fetch_add(1, Ordering::SeqCst))
}

fn open_cache(root: &Path, max_bytes: u64, clock_start: u64) -> ArtworkDiskCache {
    let config = ArtworkCacheConfig::new(root.to_path_buf()).with_max_disk_bytes(max_bytes);
    ArtworkDiskCache::open_with_clock(&config, sequence_clock_from(clock_start)).unwrap()
}

fn grid_key(owner_id: &str) -> ArtworkKey {
    ArtworkKey::new(owner_id, OwnerKind::Album, ArtworkVariant::Grid)
}

fn cached_file_path(root: &Path, key: &ArtworkKey) -> std::path::PathBuf {
    root.join("artwork")
        .join(key.size_bucket().to_string())
        .join(key.file_name())
}

fn regular_file_count(dir: &Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            count += regular_file_count(&entry.path());
        } else {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn round_trip_survives_reopen() {
    let dir = tempdir().unwrap();
    let bytes = png_bytes();
    let key = grid_key("a");

    {
        let mut cache = open_cache(dir.path(), 1_000_000, 1);
        cache.write(&key, &bytes).await.unwrap();
    }

    let mut cache = open_cache(dir.path(), 1_000_000, 100);
    assert_eq!(cache.read(&key).await.unwrap().unwrap(), bytes);
}

#[tokio::test]
async fn rewriting_a_key_counts_its_size_once() {
    let dir = tempdir().unwrap();
    let bytes = png_bytes();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 1_000_000, 1);

    cache.write(&key, &bytes).await.unwrap();
    cache.write(&key, &bytes).await.unwrap();

    assert_eq!(cache.total_size_bytes(), bytes.len() as u64);
    assert_eq!(cache.index().len(), 1);
}

#[tokio::test]
async fn undecodable_bytes_self_heal_on_read() {
    let dir = tempdir().unwrap();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 1_000_000, 1);

    cache.write(&key, b"definitely not an image").await.unwrap();

    assert!(cache.read(&key).await.unwrap().is_none());
    assert!(!cache.exists(&key));
    assert_eq!(cache.total_size_bytes(), 0);
    assert!(!cached_file_path(dir.path(), &key).exists());
}

#[tokio::test]
async fn truncated_file_self_heals_on_read() {
    let dir = tempdir().unwrap();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 1_000_000, 1);

    cache.write(&key, &png_bytes()).await.unwrap();
    std::fs::write(cached_file_path(dir.path(), &key), b"").unwrap();

    assert!(cache.read(&key).await.unwrap().is_none());
    assert!(!cache.exists(&key));
    assert_eq!(cache.total_size_bytes(), 0);
}

#[tokio::test]
async fn missing_file_self_heals_on_read() {
    let dir = tempdir().unwrap();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 1_000_000, 1);

    cache.write(&key, &png_bytes()).await.unwrap();
    std::fs::remove_file(cached_file_path(dir.path(), &key)).unwrap();

    assert!(cache.read(&key).await.unwrap().is_none());
    assert!(!cache.exists(&key));
}

#[tokio::test]
async fn eviction_keeps_recently_touched_entries() {
    let dir = tempdir().unwrap();
    let bytes = png_bytes();
    // Room for exactly two entries.
    let cap = (bytes.len() * 2) as u64;
    let mut cache = open_cache(dir.path(), cap, 1);
    let (a, b, c) = (grid_key("a"), grid_key("b"), grid_key("c"));

    cache.write(&a, &bytes).await.unwrap();
    cache.write(&b, &bytes).await.unwrap();
    assert!(cache.read(&a).await.unwrap().is_some());
    cache.write(&c, &bytes).await.unwrap();

    assert!(cache.total_size_bytes() <= cap);
    assert!(cache.exists(&a));
    assert!(cache.exists(&c));
    assert!(!cache.exists(&b));
    assert!(!cached_file_path(dir.path(), &b).exists());
}

#[tokio::test]
async fn lru_order_survives_reopen() {
    let dir = tempdir().unwrap();
    let bytes = png_bytes();
    let cap = (bytes.len() * 2) as u64;
    let (a, b, c) = (grid_key("a"), grid_key("b"), grid_key("c"));

    {
        let mut cache = open_cache(dir.path(), cap, 1);
        cache.write(&a, &bytes).await.unwrap();
        cache.write(&b, &bytes).await.unwrap();
        assert!(cache.read(&a).await.unwrap().is_some());
    }

    let mut cache = open_cache(dir.path(), cap, 100);
    cache.write(&c, &bytes).await.unwrap();

    assert!(cache.exists(&a));
    assert!(cache.exists(&c));
    assert!(!cache.exists(&b));
}

#[tokio::test]
async fn zero_budget_purges_every_regular_file() {
    let dir = tempdir().unwrap();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 0, 1);

    cache.write(&key, &png_bytes()).await.unwrap();

    assert!(!cache.exists(&key));
    assert_eq!(cache.total_size_bytes(), 0);
    assert_eq!(regular_file_count(dir.path()), 0);
}

#[tokio::test]
async fn unparseable_index_falls_back_to_empty() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("index.json"), b"{ not json").unwrap();

    let cache = open_cache(dir.path(), 1_000_000, 1);

    assert!(cache.index().is_empty());
    assert_eq!(cache.total_size_bytes(), 0);
}

#[tokio::test]
async fn remove_is_quiet_for_absent_entries_and_missing_files() {
    let dir = tempdir().unwrap();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 1_000_000, 1);

    // Absent entry.
    cache.remove(&key).await.unwrap();

    // Entry whose file already vanished.
    cache.write(&key, &png_bytes()).await.unwrap();
    std::fs::remove_file(cached_file_path(dir.path(), &key)).unwrap();
    cache.remove(&key).await.unwrap();

    assert!(!cache.exists(&key));
    assert_eq!(cache.total_size_bytes(), 0);
}

#[tokio::test]
async fn invalidate_all_recreates_an_empty_root() {
    let dir = tempdir().unwrap();
    let mut cache = open_cache(dir.path(), 1_000_000, 1);
    let (a, b) = (grid_key("a"), grid_key("b"));

    cache.write(&a, &png_bytes()).await.unwrap();
    cache.write(&b, &png_bytes()).await.unwrap();
    cache.invalidate_all().await.unwrap();

    assert!(dir.path().is_dir());
    assert_eq!(regular_file_count(dir.path()), 0);
    assert!(cache.read(&a).await.unwrap().is_none());
    assert_eq!(cache.total_size_bytes(), 0);
}

#[tokio::test]
async fn exists_consults_only_the_index() {
    let dir = tempdir().unwrap();
    let key = grid_key("a");
    let mut cache = open_cache(dir.path(), 1_000_000, 1);

    cache.write(&key, &png_bytes()).await.unwrap();
    std::fs::remove_file(cached_file_path(dir.path(), &key)).unwrap();

    // Still indexed; the next read will heal it.
    assert!(cache.exists(&key));
}
