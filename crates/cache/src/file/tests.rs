use super::*;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn config(dir: &TempDir) -> CacheConfig {
    CacheConfig::builder()
        .cache_dir(dir.path())
        .multithread_safe(true)
        .build()
        .unwrap()
}

#[test]
fn test_put_then_get() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(10, &config(&dir)).unwrap();

    assert_eq!(cache.get(3).unwrap(), None);
    assert!(cache.put(3, b"three").unwrap());
    assert!(cache.put(4, b"").unwrap());
    assert_eq!(cache.get(3).unwrap().unwrap(), &b"three"[..]);
    assert_eq!(cache.get(4).unwrap().unwrap(), &b""[..]);
    assert_eq!(cache.data_size(), 5);

    let stats = cache.stats();
    assert_eq!(stats.puts, 2);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

#[test]
fn test_second_put_is_rejected() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(2, &config(&dir)).unwrap();

    assert!(cache.put(0, b"first").unwrap());
    assert!(!cache.put(0, b"second").unwrap());
    assert_eq!(cache.get(0).unwrap().unwrap(), &b"first"[..]);
}

#[test]
fn test_index_bounds() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(2, &config(&dir)).unwrap();

    assert!(matches!(
        cache.get(2),
        Err(CacheError::IndexOutOfRange { index: 2, length: 2, .. })
    ));
    assert!(matches!(
        cache.put(7, b"x"),
        Err(CacheError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_size_limit_freezes_for_good() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::builder()
        .cache_dir(dir.path())
        .cache_size_limit(10)
        .build()
        .unwrap();
    let cache = FileCache::new(5, &config).unwrap();

    assert!(cache.put(0, b"123456").unwrap());
    assert!(!cache.put(1, b"12345").unwrap());
    assert_eq!(cache.state(), CacheState::Frozen(FreezeReason::SizeLimit));
    // Would fit in the remaining budget, but the cache is frozen
    assert!(!cache.put(2, b"1").unwrap());
    assert_eq!(cache.get(0).unwrap().unwrap(), &b"123456"[..]);
}

#[test]
fn test_rejected_put_does_not_advance_offset() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::builder()
        .cache_dir(dir.path())
        .cache_size_limit(10)
        .build()
        .unwrap();
    let cache = FileCache::new(2, &config).unwrap();

    assert!(cache.put(0, b"123456").unwrap());
    assert!(!cache.put(1, b"1234567890").unwrap());
    assert_eq!(cache.data_size(), 6);
    assert_eq!(std::fs::metadata(cache.data_path()).unwrap().len(), 6);
}

#[test]
fn test_zero_limit_admits_only_empty_blobs() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::builder()
        .cache_dir(dir.path())
        .cache_size_limit(0)
        .build()
        .unwrap();
    let cache = FileCache::new(3, &config).unwrap();

    assert!(cache.put(0, b"").unwrap());
    assert!(!cache.put(1, b"x").unwrap());
    assert_eq!(cache.state(), CacheState::Frozen(FreezeReason::SizeLimit));
    assert_eq!(cache.get(0).unwrap().unwrap(), &b""[..]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_full_disk_freezes_cache() {
    use std::fs::OpenOptions;

    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(3, &config(&dir)).unwrap();
    assert!(cache.put(0, b"before").unwrap());

    // Route blob writes to a device that always reports ENOSPC
    let index_path = cache.index_path();
    let full = BackingFiles {
        index: OpenOptions::new()
            .read(true)
            .write(true)
            .open(&index_path)
            .unwrap(),
        data: OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/full")
            .unwrap(),
        index_path,
        data_path: PathBuf::from("/dev/full"),
    };
    let original = std::mem::replace(&mut *cache.files.write(), full);

    assert!(!cache.put(1, b"after").unwrap());
    assert_eq!(cache.state(), CacheState::Frozen(FreezeReason::DiskFull));
    assert_eq!(cache.data_size(), 6);

    *cache.files.write() = original;
    assert!(!cache.put(2, b"x").unwrap());
    assert_eq!(cache.get(0).unwrap().unwrap(), &b"before"[..]);
    assert_eq!(cache.get(1).unwrap(), None);
    assert_eq!(cache.stats().rejected_puts, 2);
}

#[test]
fn test_close_removes_files() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(1, &config(&dir)).unwrap();
    let (index, data) = (cache.index_path(), cache.data_path());
    assert!(index.exists() && data.exists());

    cache.put(0, b"x").unwrap();
    cache.close().unwrap();
    assert!(!index.exists());
    assert!(!data.exists());
    assert_eq!(cache.get(0).unwrap(), None);
    assert!(!cache.put(0, b"y").unwrap());

    // A second close is a no-op
    cache.close().unwrap();
}

#[test]
fn test_drop_removes_files() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(1, &config(&dir)).unwrap();
    let index = cache.index_path();
    drop(cache);
    assert!(!index.exists());
}

#[test]
fn test_preserve_then_preload() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(4, &config(&dir)).unwrap();
    for i in 0..4 {
        assert!(cache.put(i, format!("blob-{i}").as_bytes()).unwrap());
    }

    assert!(cache.preserve("snapshot").unwrap());
    assert_eq!(cache.state(), CacheState::Frozen(FreezeReason::Preserved));
    assert!(!cache.put(0, b"late").unwrap());
    assert!(!cache.preserve("snapshot").unwrap());
    cache.close().unwrap();

    let (index, data) = preserved_file_paths(dir.path(), "snapshot");
    assert!(index.exists() && data.exists());

    let loaded = FileCache::new(4, &config(&dir)).unwrap();
    assert!(loaded.preload("snapshot").unwrap());
    assert_eq!(loaded.state(), CacheState::Frozen(FreezeReason::Preloaded));
    for i in 0..4 {
        assert_eq!(
            loaded.get(i).unwrap().unwrap(),
            format!("blob-{i}").as_bytes()
        );
    }

    // Preloaded files outlive the cache that attached to them
    loaded.close().unwrap();
    assert!(index.exists() && data.exists());
}

#[test]
fn test_preload_missing_returns_false() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(2, &config(&dir)).unwrap();
    assert!(!cache.preload("nothing-here").unwrap());
    assert!(cache.state().is_writable());
}

#[test]
fn test_preload_rejects_wrong_length() {
    let dir = TempDir::new().unwrap();
    let source = FileCache::new(2, &config(&dir)).unwrap();
    assert!(source.preserve("pair").unwrap());

    let target = FileCache::new(3, &config(&dir)).unwrap();
    assert!(target.preload("pair").unwrap_err().is_corruption());
}

#[test]
fn test_preload_rejects_written_cache() {
    let dir = TempDir::new().unwrap();
    let source = FileCache::new(2, &config(&dir)).unwrap();
    assert!(source.preserve("pair").unwrap());

    let target = FileCache::new(2, &config(&dir)).unwrap();
    target.put(0, b"x").unwrap();
    assert!(matches!(
        target.preload("pair"),
        Err(CacheError::Configuration { .. })
    ));
}

#[test]
fn test_preserve_overwrite() {
    let dir = TempDir::new().unwrap();
    let first = FileCache::new(1, &config(&dir)).unwrap();
    first.put(0, b"old").unwrap();
    assert!(first.preserve("shared").unwrap());

    let second = FileCache::new(1, &config(&dir)).unwrap();
    second.put(0, b"new").unwrap();
    assert!(!second.preserve("shared").unwrap());
    assert!(second.preserve_with("shared", true).unwrap());

    let loaded = FileCache::new(1, &config(&dir)).unwrap();
    assert!(loaded.preload("shared").unwrap());
    assert_eq!(loaded.get(0).unwrap().unwrap(), &b"new"[..]);
}

#[test]
fn test_overwrite_own_preloaded_snapshot() {
    let dir = TempDir::new().unwrap();
    let source = FileCache::new(2, &config(&dir)).unwrap();
    source.put(0, b"kept").unwrap();
    assert!(source.preserve("snap").unwrap());
    source.close().unwrap();

    let cache = FileCache::new(2, &config(&dir)).unwrap();
    assert!(cache.preload("snap").unwrap());
    assert!(cache.preserve_with("snap", true).unwrap());
    assert!(cache.preserve("snap").unwrap());
    assert_eq!(cache.get(0).unwrap().unwrap(), &b"kept"[..]);
    cache.close().unwrap();

    let (index, data) = preserved_file_paths(dir.path(), "snap");
    assert!(index.exists() && data.exists());
    let reloaded = FileCache::new(2, &config(&dir)).unwrap();
    assert!(reloaded.preload("snap").unwrap());
    assert_eq!(reloaded.get(0).unwrap().unwrap(), &b"kept"[..]);
}

#[test]
fn test_overwrite_leaves_no_staging_files() {
    let dir = TempDir::new().unwrap();
    let first = FileCache::new(1, &config(&dir)).unwrap();
    first.put(0, b"old").unwrap();
    assert!(first.preserve("shared").unwrap());
    first.close().unwrap();

    let second = FileCache::new(1, &config(&dir)).unwrap();
    second.put(0, b"new").unwrap();
    assert!(second.preserve_with("shared", true).unwrap());
    second.close().unwrap();

    let mut names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, ["shared.cached", "shared.cachei"]);
}

#[test]
fn test_concurrent_writers() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(FileCache::new(64, &config(&dir)).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in (worker..64).step_by(4) {
                    let payload = vec![worker as u8; i + 1];
                    assert!(cache.put(i, &payload).unwrap());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..64 {
        let blob = cache.get(i).unwrap().unwrap();
        assert_eq!(blob.len(), i + 1);
        assert!(blob.iter().all(|b| *b == (i % 4) as u8));
    }
}
