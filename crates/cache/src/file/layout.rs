//! Index and data file handling shared by the file-backed caches
//!
//! Both caches use the same pair of files so that a cache preserved by one
//! implementation can be preloaded by the other:
//!
//! - `{name}.cachei`: `length` records of [`RECORD_SIZE`] bytes
//! - `{name}.cached`: blobs concatenated in write order

use crate::errors::{CacheError, Result};
use crate::record::{IndexRecord, RECORD_SIZE};
use bytes::Bytes;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

pub(crate) const INDEX_EXTENSION: &str = "cachei";
pub(crate) const DATA_EXTENSION: &str = "cached";

/// Shared names of a preserved cache inside `dir`
pub fn preserved_paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{name}.{INDEX_EXTENSION}")),
        dir.join(format!("{name}.{DATA_EXTENSION}")),
    )
}

/// Open descriptors for one index/data pair
#[derive(Debug)]
pub(crate) struct BackingFiles {
    pub index: File,
    pub data: File,
    pub index_path: PathBuf,
    pub data_path: PathBuf,
}

impl BackingFiles {
    /// Create a fresh pair of uniquely named files in `dir` with every slot empty
    pub fn create(dir: &Path, length: usize) -> Result<Self> {
        let (index, index_path) = create_unique(dir, INDEX_EXTENSION)?;
        let (data, data_path) = create_unique(dir, DATA_EXTENSION)?;

        index
            .write_all_at(&IndexRecord::empty_index(length), 0)
            .map_err(|e| CacheError::io(&index_path, "initialize index", e))?;

        tracing::debug!(
            index = %index_path.display(),
            data = %data_path.display(),
            length,
            "created cache files"
        );

        Ok(Self {
            index,
            data,
            index_path,
            data_path,
        })
    }

    /// Open an existing pair
    pub fn open(index_path: &Path, data_path: &Path, writable: bool) -> Result<Self> {
        let open = |path: &Path| {
            OpenOptions::new()
                .read(true)
                .write(writable)
                .open(path)
                .map_err(|e| CacheError::io(path, "open cache file", e))
        };

        Ok(Self {
            index: open(index_path)?,
            data: open(data_path)?,
            index_path: index_path.to_path_buf(),
            data_path: data_path.to_path_buf(),
        })
    }

    pub fn read_record(&self, index: usize) -> Result<IndexRecord> {
        let mut buf = [0u8; RECORD_SIZE];
        self.index
            .read_exact_at(&mut buf, IndexRecord::position(index))
            .map_err(|e| CacheError::io(&self.index_path, "read index record", e))?;
        Ok(IndexRecord::decode(&buf))
    }

    pub fn write_record(&self, index: usize, record: IndexRecord) -> Result<()> {
        self.index
            .write_all_at(&record.encode(), IndexRecord::position(index))
            .map_err(|e| CacheError::io(&self.index_path, "write index record", e))
    }

    /// Read the blob a non-empty record points at
    pub fn read_blob(&self, index: usize, record: IndexRecord) -> Result<Option<Bytes>> {
        let Some(size) = record.len() else {
            return Ok(None);
        };

        let size = usize::try_from(size).map_err(|_| {
            CacheError::corruption(index.to_string(), format!("blob size {size} does not fit in memory"))
        })?;
        let mut buf = vec![0u8; size];
        match self.data.read_exact_at(&mut buf, record.offset) {
            Ok(()) => Ok(Some(Bytes::from(buf))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CacheError::corruption(
                index.to_string(),
                format!(
                    "index points at [{}, {}) past the end of {}",
                    record.offset,
                    record.offset + size as u64,
                    self.data_path.display()
                ),
            )),
            Err(e) => Err(CacheError::io(&self.data_path, "read blob", e)),
        }
    }

    /// Write `data` at `offset`. `write_all_at` retries short writes and
    /// `EINTR`; the raw error is returned so callers can detect `ENOSPC`.
    pub fn write_blob(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.data.write_all_at(data, offset)
    }

    pub fn data_len(&self) -> Result<u64> {
        self.data
            .metadata()
            .map(|m| m.len())
            .map_err(|e| CacheError::io(&self.data_path, "stat data file", e))
    }

    pub fn sync(&self) -> Result<()> {
        self.index
            .sync_all()
            .map_err(|e| CacheError::io(&self.index_path, "sync index", e))?;
        self.data
            .sync_all()
            .map_err(|e| CacheError::io(&self.data_path, "sync data", e))
    }

    /// Unlink both files. Missing files are not an error.
    pub fn remove(&self) -> Result<()> {
        remove_if_exists(&self.index_path)?;
        remove_if_exists(&self.data_path)
    }
}

fn create_unique(dir: &Path, extension: &str) -> Result<(File, PathBuf)> {
    let file = tempfile::Builder::new()
        .prefix("blobio-")
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)
        .map_err(|e| CacheError::io(dir, "create cache file", e))?;

    file.keep()
        .map_err(|e| CacheError::io(dir, "create cache file", e.error))
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io(path, "remove cache file", e)),
    }
}

/// Hard-link the backing pair to the shared names for `name`.
///
/// Returns `Ok(false)` when a target exists and `overwrite` is not set, and
/// `Ok(true)` without touching anything when the targets already are the
/// backing files by name (a preloaded cache preserved under its own name). Existing
/// targets are only replaced once links to the new files are in place.
pub(crate) fn link_preserved(
    files: &BackingFiles,
    dir: &Path,
    name: &str,
    overwrite: bool,
) -> Result<bool> {
    let (index_target, data_target) = preserved_paths(dir, name);

    if is_same_path(&files.index_path, &index_target)? && is_same_path(&files.data_path, &data_target)? {
        tracing::debug!(name, "cache is already preserved under this name");
        return Ok(true);
    }

    files.sync()?;

    if overwrite {
        replace_preserved(files, dir, &index_target, &data_target)?;
        tracing::debug!(name, dir = %dir.display(), "preserved cache, replacing existing files");
        return Ok(true);
    }

    if index_target.exists() || data_target.exists() {
        tracing::warn!(name, dir = %dir.display(), "preserved cache already exists");
        return Ok(false);
    }

    match fs::hard_link(&files.index_path, &index_target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::warn!(name, "lost the race to preserve the index file");
            return Ok(false);
        }
        Err(e) => return Err(CacheError::io(&index_target, "link preserved index", e)),
    }

    if let Err(e) = fs::hard_link(&files.data_path, &data_target) {
        // A lone index file would fool a later preload
        remove_if_exists(&index_target)?;
        if e.kind() == io::ErrorKind::AlreadyExists {
            tracing::warn!(name, "lost the race to preserve the data file");
            return Ok(false);
        }
        return Err(CacheError::io(&data_target, "link preserved data", e));
    }

    tracing::debug!(name, dir = %dir.display(), "preserved cache");
    Ok(true)
}

/// Link the pair into a staging directory next to the targets, then rename
/// the links over them. The staging directory is removed on every path.
fn replace_preserved(
    files: &BackingFiles,
    dir: &Path,
    index_target: &Path,
    data_target: &Path,
) -> Result<()> {
    let staging = tempfile::Builder::new()
        .prefix(".blobio-preserve-")
        .tempdir_in(dir)
        .map_err(|e| CacheError::io(dir, "create preserve staging directory", e))?;
    let staged_index = staging.path().join(INDEX_EXTENSION);
    let staged_data = staging.path().join(DATA_EXTENSION);

    fs::hard_link(&files.index_path, &staged_index)
        .map_err(|e| CacheError::io(&staged_index, "stage preserved index", e))?;
    fs::hard_link(&files.data_path, &staged_data)
        .map_err(|e| CacheError::io(&staged_data, "stage preserved data", e))?;

    fs::rename(&staged_data, data_target)
        .map_err(|e| CacheError::io(data_target, "replace preserved data", e))?;
    fs::rename(&staged_index, index_target)
        .map_err(|e| CacheError::io(index_target, "replace preserved index", e))
}

/// Whether both paths resolve to the same directory entry. Hard links to one
/// inode under different names do not match; a missing path never does.
fn is_same_path(a: &Path, b: &Path) -> Result<bool> {
    let resolve = |path: &Path| match fs::canonicalize(path) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, "resolve cache file", e)),
    };
    match (resolve(a)?, resolve(b)?) {
        (Some(left), Some(right)) => Ok(left == right),
        _ => Ok(false),
    }
}

/// Locate a preserved pair for `name` and check its index size.
///
/// Returns `Ok(None)` when either file is missing.
pub(crate) fn find_preserved(dir: &Path, name: &str, length: usize) -> Result<Option<(PathBuf, PathBuf)>> {
    let (index_path, data_path) = preserved_paths(dir, name);
    if !index_path.exists() || !data_path.exists() {
        tracing::debug!(name, dir = %dir.display(), "no preserved cache to preload");
        return Ok(None);
    }

    let actual = fs::metadata(&index_path)
        .map_err(|e| CacheError::io(&index_path, "stat preserved index", e))?
        .len();
    let expected = (length as u64) * RECORD_SIZE as u64;
    if actual != expected {
        return Err(CacheError::corruption(
            name,
            format!(
                "index file is {actual} bytes, expected {expected} for {length} slots"
            ),
        ));
    }

    Ok(Some((index_path, data_path)))
}
