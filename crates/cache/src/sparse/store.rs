//! The local file mirroring a remote source byte for byte

use super::SparseCacheOptions;
use crate::errors::{CacheError, Result};
use blobio_utils::xdg::ensure_cache_dir;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Sparse file with the same size as the source; byte `n` of the source is
/// stored at offset `n`. Holes read as zeros and are never served.
#[derive(Debug)]
pub(crate) struct SparseFile {
    file: File,
    path: PathBuf,
    /// Created by us in the cache directory, removed on close
    temporary: bool,
}

impl SparseFile {
    pub fn create(size: u64, options: &SparseCacheOptions) -> Result<Self> {
        let (file, path, temporary) = match &options.cache_path {
            Some(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| CacheError::io(path, "create sparse cache file", e))?;
                (file, path.clone(), false)
            }
            None => {
                let dir = ensure_cache_dir(options.cache_dir.as_deref())?;
                let (file, path) = tempfile::Builder::new()
                    .prefix("blobio-sparse-")
                    .tempfile_in(&dir)
                    .map_err(|e| CacheError::io(&dir, "create sparse cache file", e))?
                    .keep()
                    .map_err(|e| CacheError::io(&dir, "create sparse cache file", e.error))?;
                (file, path, true)
            }
        };

        file.set_len(size)
            .map_err(|e| CacheError::io(&path, "size sparse cache file", e))?;
        tracing::debug!(path = %path.display(), size, "created sparse cache file");

        Ok(Self {
            file,
            path,
            temporary,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        self.file
            .read_exact_at(buf, offset)
            .map_err(|e| CacheError::io(&self.path, "read sparse cache", e))
    }

    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        self.file
            .write_all_at(buf, offset)
            .map_err(|e| CacheError::io(&self.path, "write sparse cache", e))
    }

    /// Hard-link to `dest`, copying instead when `dest` is on another device
    pub fn preserve(&self, dest: &Path) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| CacheError::io(&self.path, "sync sparse cache", e))?;

        match fs::hard_link(&self.path, dest) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
                tracing::debug!(dest = %dest.display(), "cross-device preserve, copying");
                fs::copy(&self.path, dest)
                    .map_err(|e| CacheError::io(dest, "copy sparse cache", e))?;
            }
            Err(e) => return Err(CacheError::io(dest, "link sparse cache", e)),
        }

        tracing::debug!(src = %self.path.display(), dest = %dest.display(), "preserved sparse cache");
        Ok(())
    }

    /// Remove the file if we created it
    pub fn remove(&self) -> Result<()> {
        if !self.temporary {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&self.path, "remove sparse cache", e)),
        }
    }
}
