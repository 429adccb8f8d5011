//! Cache over an index/data file pair shared by several processes
//!
//! Uses the same on-disk layout as [`crate::file::FileCache`]. Processes
//! coordinate through advisory locks on the index file: shared while reading
//! a record, exclusive while checking and filling a slot. The data file is
//! never locked; under the exclusive lock its length is the next append
//! position, and a record is only written after the blob it points at.
//!
//! Descriptors are opened lazily and reopened whenever the calling process is
//! not the one that opened them, so an instance can cross `fork()` or be
//! serialized to another process. Only an explicit `close()` in the process
//! that created the files removes them.

use crate::config::CacheConfig;
use crate::errors::{is_disk_full, CacheError, Result};
use crate::file::layout::{find_preserved, link_preserved, BackingFiles};
use crate::record::IndexRecord;
use crate::state::{CacheState, FreezeReason, StateCell};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::traits::{check_index, check_length, Cache};
use blobio_utils::file_lock::FileLockGuard;
use blobio_utils::fork::{ForkGuard, ForkPolicy};
use blobio_utils::xdg::ensure_cache_dir;
use bytes::Bytes;
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything needed to attach to the cache from another process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiprocessFileCacheState {
    pub length: usize,
    pub dir: PathBuf,
    pub index_path: PathBuf,
    pub data_path: PathBuf,
    pub cache_size_limit: Option<u64>,
    /// Process allowed to remove the files on `close`
    pub owner_pid: u32,
    pub state: CacheState,
    pub preloaded: bool,
}

#[derive(Debug)]
struct Backing {
    index_path: PathBuf,
    data_path: PathBuf,
    files: Option<BackingFiles>,
}

enum PutOutcome {
    Stored(u64),
    Occupied,
    Frozen(FreezeReason),
}

/// Multi-process and multi-thread safe file cache
#[derive(Debug)]
pub struct MultiprocessFileCache {
    length: usize,
    dir: PathBuf,
    cache_size_limit: Option<u64>,
    owner_pid: u32,
    /// Set only on the instance that created the files
    created_here: bool,
    preloaded: AtomicBool,
    lock: RwLock<()>,
    backing: RwLock<Backing>,
    fork: ForkGuard,
    state: StateCell,
    stats: CacheStats,
}

impl MultiprocessFileCache {
    /// Create an empty cache with `length` slots.
    ///
    /// `config.multithread_safe` is ignored; this cache always locks.
    pub fn new(length: usize, config: &CacheConfig) -> Result<Self> {
        check_length(length)?;
        config.validate()?;

        let dir = ensure_cache_dir(config.cache_dir.as_deref())?;
        let files = BackingFiles::create(&dir, length)?;

        Ok(Self {
            length,
            dir,
            cache_size_limit: config.cache_size_limit,
            owner_pid: std::process::id(),
            created_here: true,
            preloaded: AtomicBool::new(false),
            lock: RwLock::new(()),
            backing: RwLock::new(Backing {
                index_path: files.index_path.clone(),
                data_path: files.data_path.clone(),
                files: Some(files),
            }),
            fork: ForkGuard::new("multiprocess file cache", ForkPolicy::Reset),
            state: StateCell::default(),
            stats: CacheStats::default(),
        })
    }

    /// Attach to files described by `state`. Nothing is opened until first use.
    pub fn from_state(state: MultiprocessFileCacheState) -> Self {
        Self {
            length: state.length,
            dir: state.dir,
            cache_size_limit: state.cache_size_limit,
            owner_pid: state.owner_pid,
            created_here: false,
            preloaded: AtomicBool::new(state.preloaded),
            lock: RwLock::new(()),
            backing: RwLock::new(Backing {
                index_path: state.index_path,
                data_path: state.data_path,
                files: None,
            }),
            fork: ForkGuard::new("multiprocess file cache", ForkPolicy::Reset),
            state: StateCell::new(state.state),
            stats: CacheStats::default(),
        }
    }

    pub fn to_state(&self) -> MultiprocessFileCacheState {
        let backing = self.backing.read();
        MultiprocessFileCacheState {
            length: self.length,
            dir: self.dir.clone(),
            index_path: backing.index_path.clone(),
            data_path: backing.data_path.clone(),
            cache_size_limit: self.cache_size_limit,
            owner_pid: self.owner_pid,
            state: self.state.get(),
            preloaded: self.preloaded.load(Ordering::Acquire),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }

    pub fn index_path(&self) -> PathBuf {
        self.backing.read().index_path.clone()
    }

    pub fn data_path(&self) -> PathBuf {
        self.backing.read().data_path.clone()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Share the cache as `{name}.cachei`/`{name}.cached`; `false` if taken
    pub fn preserve(&self, name: &str) -> Result<bool> {
        self.preserve_with(name, false)
    }

    pub fn preserve_with(&self, name: &str, overwrite: bool) -> Result<bool> {
        let _guard = self.lock.write();
        if self.state.get() == CacheState::Closed {
            return Err(CacheError::closed("preserve"));
        }

        let linked = self.with_files(|files| {
            let _flock = FileLockGuard::exclusive(&files.index)
                .map_err(|e| CacheError::io(&files.index_path, "lock index", e))?;
            link_preserved(files, &self.dir, name, overwrite)
        })?;

        if linked {
            self.state.freeze(FreezeReason::Preserved);
        }
        Ok(linked)
    }

    /// Attach to the preserved pair `name`. `false` if it does not exist.
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

        let files = BackingFiles::open(&index_path, &data_path, false)?;
        let previous = {
            let mut backing = self.backing.write();
            let previous = (backing.index_path.clone(), backing.data_path.clone());
            *backing = Backing {
                index_path,
                data_path,
                files: Some(files),
            };
            previous
        };

        let was_preloaded = self.preloaded.swap(true, Ordering::AcqRel);
        if !was_preloaded && std::process::id() == self.owner_pid {
            crate::file::layout::remove_if_exists(&previous.0)?;
            crate::file::layout::remove_if_exists(&previous.1)?;
        }

        self.state.freeze(FreezeReason::Preloaded);
        tracing::debug!(name, dir = %self.dir.display(), "preloaded multiprocess cache");
        Ok(true)
    }

    /// Run `f` against descriptors owned by the calling process
    fn with_files<T>(&self, f: impl FnOnce(&BackingFiles) -> Result<T>) -> Result<T> {
        if self.fork.check()? {
            // Inherited descriptors share lock state with the parent
            self.backing.write().files = None;
        }

        {
            let backing = self.backing.read();
            if let Some(files) = &backing.files {
                return f(files);
            }
        }

        let mut backing = self.backing.write();
        if backing.files.is_none() {
            let writable = !self.preloaded.load(Ordering::Acquire);
            let files = BackingFiles::open(&backing.index_path, &backing.data_path, writable)?;
            tracing::debug!(
                index = %backing.index_path.display(),
                pid = std::process::id(),
                "opened multiprocess cache files"
            );
            backing.files = Some(files);
        }

        let backing = RwLockWriteGuard::downgrade(backing);
        let files = backing
            .files
            .as_ref()
            .ok_or_else(|| CacheError::closed("open cache files"))?;
        f(files)
    }

    fn put_locked(&self, files: &BackingFiles, index: usize, data: &[u8]) -> Result<PutOutcome> {
        let _flock = FileLockGuard::exclusive(&files.index)
            .map_err(|e| CacheError::io(&files.index_path, "lock index", e))?;

        if !files.read_record(index)?.is_empty() {
            return Ok(PutOutcome::Occupied);
        }

        let size = data.len() as u64;
        let offset = files.data_len()?;
        if let Some(limit) = self.cache_size_limit {
            if offset + size > limit {
                tracing::info!(limit, used = offset, "cache size limit reached, freezing");
                return Ok(PutOutcome::Frozen(FreezeReason::SizeLimit));
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
                return Ok(PutOutcome::Frozen(FreezeReason::DiskFull));
            }
            Err(e) => return Err(CacheError::io(&files.data_path, "write blob", e)),
        }

        files.write_record(index, IndexRecord::new(offset, size))?;
        Ok(PutOutcome::Stored(size))
    }
}

impl Cache for MultiprocessFileCache {
    fn len(&self) -> usize {
        self.length
    }

    fn multiprocess_safe(&self) -> bool {
        true
    }

    fn multithread_safe(&self) -> bool {
        true
    }

    fn get(&self, index: usize) -> Result<Option<Bytes>> {
        check_index(index, self.length)?;
        let _guard = self.lock.read();

        if !self.state.get().is_readable() {
            return Ok(None);
        }

        let blob = self.with_files(|files| {
            let record = {
                let _flock = FileLockGuard::shared(&files.index)
                    .map_err(|e| CacheError::io(&files.index_path, "lock index", e))?;
                files.read_record(index)?
            };
            files.read_blob(index, record)
        })?;

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
            self.stats.record_rejected_put();
            return Ok(false);
        }

        match self.with_files(|files| self.put_locked(files, index, data))? {
            PutOutcome::Stored(size) => {
                self.stats.record_put(size);
                Ok(true)
            }
            PutOutcome::Occupied => {
                self.stats.record_rejected_put();
                Ok(false)
            }
            PutOutcome::Frozen(reason) => {
                self.state.freeze(reason);
                self.stats.record_rejected_put();
                Ok(false)
            }
        }
    }

    fn state(&self) -> CacheState {
        self.state.get()
    }

    /// Release descriptors. Files are removed only when called from the
    /// process that created them and they were not replaced by `preload`.
    fn close(&self) -> Result<()> {
        let _guard = self.lock.write();
        if self.state.close() == CacheState::Closed {
            return Ok(());
        }

        let (index_path, data_path) = {
            let mut backing = self.backing.write();
            backing.files = None;
            (backing.index_path.clone(), backing.data_path.clone())
        };

        let current = std::process::id();
        if current != self.owner_pid {
            tracing::debug!(owner = self.owner_pid, current, "closing borrowed cache, files kept");
            return Ok(());
        }
        if self.preloaded.load(Ordering::Acquire) {
            return Ok(());
        }

        crate::file::layout::remove_if_exists(&index_path)?;
        crate::file::layout::remove_if_exists(&data_path)?;
        tracing::debug!(dir = %self.dir.display(), "closed multiprocess cache");
        Ok(())
    }
}

impl Drop for MultiprocessFileCache {
    fn drop(&mut self) {
        if !self.created_here {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!("failed to clean up multiprocess cache: {e}");
        }
    }
}

impl Serialize for MultiprocessFileCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_state().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MultiprocessFileCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        MultiprocessFileCacheState::deserialize(deserializer).map(Self::from_state)
    }
}
