//! Single-process cache over an index/data file pair
//!
//! `put` appends the blob to the data file and only then writes the index
//! record that points at it, so a reader that sees a non-empty record always
//! finds the bytes in place.

pub(crate) mod layout;

#[cfg(test)]
mod tests;

use crate::config::CacheConfig;
use crate::errors::{is_disk_full, CacheError, Result};
use crate::record::IndexRecord;
use crate::state::{CacheState, FreezeReason, StateCell};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::traits::{check_index, check_length, Cache};
use blobio_utils::sync::OptionalRwLock;
use blobio_utils::xdg::ensure_cache_dir;
use bytes::Bytes;
use layout::{find_preserved, link_preserved, BackingFiles};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub use layout::preserved_paths as preserved_file_paths;

/// Cache backed by two files on local disk, for one process.
///
/// With `multithread_safe` the instance may be shared between threads; a
/// reader-writer lock serializes `put`s and lets `get`s run in parallel.
#[derive(Debug)]
pub struct FileCache {
    length: usize,
    dir: PathBuf,
    cache_size_limit: Option<u64>,
    multithread_safe: bool,
    lock: OptionalRwLock,
    files: RwLock<BackingFiles>,
    /// Whether `close` unlinks the files; cleared by `preload`
    owns_files: AtomicBool,
    next_offset: AtomicU64,
    state: StateCell,
    stats: CacheStats,
}

impl FileCache {
    /// Create an empty cache with `length` slots
    pub fn new(length: usize, config: &CacheConfig) -> Result<Self> {
        check_length(length)?;
        config.validate()?;

        let dir = ensure_cache_dir(config.cache_dir.as_deref())?;
        let files = BackingFiles::create(&dir, length)?;

        Ok(Self {
            length,
            dir,
            cache_size_limit: config.cache_size_limit,
            multithread_safe: config.multithread_safe,
            lock: OptionalRwLock::new(config.multithread_safe),
            files: RwLock::new(files),
            owns_files: AtomicBool::new(true),
            next_offset: AtomicU64::new(0),
            state: StateCell::default(),
            stats: CacheStats::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_size_limit(&self) -> Option<u64> {
        self.cache_size_limit
    }

    pub fn index_path(&self) -> PathBuf {
        self.files.read().index_path.clone()
    }

    pub fn data_path(&self) -> PathBuf {
        self.files.read().data_path.clone()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Bytes appended to the data file so far
    pub fn data_size(&self) -> u64 {
        self.next_offset.load(Ordering::Acquire)
    }

    /// Share the cache as `{name}.cachei`/`{name}.cached` in the cache
    /// directory. Returns `false` if either name is taken.
    pub fn preserve(&self, name: &str) -> Result<bool> {
        self.preserve_with(name, false)
    }

    /// Like [`preserve`](Self::preserve), optionally replacing existing files.
    /// The cache is frozen once the files are shared.
    pub fn preserve_with(&self, name: &str, overwrite: bool) -> Result<bool> {
        let _guard = self.lock.write();
        if self.state.get() == CacheState::Closed {
            return Err(CacheError::closed("preserve"));
        }

        if !link_preserved(&self.files.read(), &self.dir, name, overwrite)? {
            return Ok(false);
        }

        self.state.freeze(FreezeReason::Preserved);
        Ok(true)
    }

    /// Replace the backing files with a preserved pair named `name`.
    ///
    /// Returns `false` if the pair does not exist. Only an untouched cache
    /// can be preloaded.
    pub fn preload(&self, name: &str) -> Result<bool> {
        let _guard = self.lock.write();
        match self.state.get() {
            CacheState::Open => {}
            CacheState::Closed => return Err(CacheError::closed("preload")),
            CacheState::Frozen(reason) => {
                return Err(CacheError::configuration(format!(
                    "cannot preload into a frozen cache ({reason:?})"
                )))
            }
        }
        if self.stats.snapshot().puts > 0 {
            return Err(CacheError::configuration(
                "cannot preload into a cache that already holds data",
            ));
        }

        let Some((index_path, data_path)) = find_preserved(&self.dir, name, self.length)? else {
            return Ok(false);
        };

        let preloaded = BackingFiles::open(&index_path, &data_path, false)?;
        let data_len = preloaded.data_len()?;
        let previous = std::mem::replace(&mut *self.files.write(), preloaded);
        if self.owns_files.swap(false, Ordering::AcqRel) {
            previous.remove()?;
        }

        self.next_offset.store(data_len, Ordering::Release);
        self.state.freeze(FreezeReason::Preloaded);
        tracing::debug!(name, dir = %self.dir.display(), "preloaded cache");
        Ok(true)
    }

    fn reject(&self) -> Result<bool> {
        self.stats.record_rejected_put();
        Ok(false)
    }
}

impl Cache for FileCache {
    fn len(&self) -> usize {
        self.length
    }

    fn multiprocess_safe(&self) -> bool {
        false
    }

    fn multithread_safe(&self) -> bool {
        self.multithread_safe
    }

    fn get(&self, index: usize) -> Result<Option<Bytes>> {
        check_index(index, self.length)?;
        let _guard = self.lock.read();

        if !self.state.get().is_readable() {
            return Ok(None);
        }

        let files = self.files.read();
        let record = files.read_record(index)?;
        let blob = files.read_blob(index, record)?;
        if blob.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(blob)
    }

    fn put(&self, index: usize, data: &[u8]) -> Result<bool> {
        check_index(index, self.length)?;
        let _guard = self.lock.write();

        if !self.state.get().is_writable() {
            return self.reject();
        }

        let files = self.files.read();
        if !files.read_record(index)?.is_empty() {
            return self.reject();
        }

        let size = data.len() as u64;
        // Advanced only after a successful write so rejected puts leave no gap
        let offset = self.next_offset.load(Ordering::Acquire);

        if let Some(limit) = self.cache_size_limit {
            if offset + size > limit {
                if self.state.freeze(FreezeReason::SizeLimit) {
                    tracing::info!(limit, used = offset, "cache size limit reached, freezing");
                }
                return self.reject();
            }
        }

        match files.write_blob(offset, data) {
            Ok(()) => {}
            Err(e) if is_disk_full(&e) => {
                tracing::warn!(
                    path = %files.data_path.display(),
                    index,
                    "no space left on device, freezing cache"
                );
                self.state.freeze(FreezeReason::DiskFull);
                return self.reject();
            }
            Err(e) => return Err(CacheError::io(&files.data_path, "write blob", e)),
        }

        self.next_offset.store(offset + size, Ordering::Release);
        files.write_record(index, IndexRecord::new(offset, size))?;
        self.stats.record_put(size);
        Ok(true)
    }

    fn state(&self) -> CacheState {
        self.state.get()
    }

    fn close(&self) -> Result<()> {
        let _guard = self.lock.write();
        if self.state.close() == CacheState::Closed {
            return Ok(());
        }

        if self.owns_files.swap(false, Ordering::AcqRel) {
            self.files.read().remove()?;
        }
        tracing::debug!(dir = %self.dir.display(), "closed file cache");
        Ok(())
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("failed to clean up file cache: {e}");
        }
    }
}
