//! Sparse byte-range cache for large remote files
//!
//! The wrappers sit between a reader and a slow seekable source. Bytes read
//! once are written into a local sparse file at their own offsets and served
//! from there afterwards.
//!
//! - [`DynamicCachedWrapper`] tracks arbitrary byte ranges and fetches
//!   exactly what is missing.
//! - [`CachedWrapper`] works in fixed pages: a page is fetched whole the
//!   first time any byte of it is read, and cached bytes are served from a
//!   memory map.
//!
//! Both keep their state behind one reader-writer lock held for the whole of
//! a `read` or `seek`, so a wrapper can be shared between threads as `&W`.
// TODO: per-page locks if the single lock shows up in profiles of parallel
// readers on one wrapper.

mod dynamic;
mod paged;
mod range;
mod store;


pub use dynamic::DynamicCachedWrapper;
pub use paged::CachedWrapper;
pub use range::{ByteRange, RangeList};

use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// Default page size of [`CachedWrapper`]
pub const DEFAULT_PAGESIZE: u64 = 16 * 1024 * 1024;

/// Options shared by both wrappers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseCacheOptions {
    /// Directory for the temporary cache file
    pub cache_dir: Option<PathBuf>,
    /// Keep the cache at this path instead of a temporary file
    pub cache_path: Option<PathBuf>,
    pub multithread_safe: bool,
    /// Page size of [`CachedWrapper`]; ignored by the dynamic wrapper
    pub pagesize: u64,
}

impl Default for SparseCacheOptions {
    fn default() -> Self {
        Self {
            cache_dir: None,
            cache_path: None,
            multithread_safe: false,
            pagesize: DEFAULT_PAGESIZE,
        }
    }
}

impl SparseCacheOptions {
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_multithread_safe(mut self, enabled: bool) -> Self {
        self.multithread_safe = enabled;
        self
    }

    pub fn with_pagesize(mut self, pagesize: u64) -> Self {
        self.pagesize = pagesize;
        self
    }
}

/// New position for `seek`, or `InvalidInput` if it would be negative
pub(crate) fn resolve_seek(pos: u64, size: u64, target: SeekFrom) -> io::Result<u64> {
    let (base, delta) = match target {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(delta) => (pos, delta),
        SeekFrom::End(delta) => (size, delta),
    };

    base.checked_add_signed(delta).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid seek to a negative or overflowing position ({base} + {delta})"),
        )
    })
}

/// Bytes a read of `requested` at `pos` may return
pub(crate) fn clamp_read(pos: u64, size: u64, requested: usize) -> u64 {
    size.saturating_sub(pos).min(requested as u64)
}

/// Read exactly `buf.len()` bytes of `source` starting at `offset`
pub(crate) fn fetch_exact<R: Read + Seek>(source: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    source.seek(SeekFrom::Start(offset))?;
    source.read_exact(buf)
}
