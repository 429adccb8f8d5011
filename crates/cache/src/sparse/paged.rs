use super::range::{ByteRange, RangeList};
use super::store::SparseFile;
use super::{clamp_read, fetch_exact, resolve_seek, SparseCacheOptions};
use crate::errors::{CacheError, Result};
use crate::state::{CacheState, FreezeReason};
use memmap2::Mmap;
use parking_lot::RwLock;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug)]
struct PagedState<R> {
    source: R,
    pos: u64,
    /// One flag per page
    pages: Vec<bool>,
    state: CacheState,
}

/// Sparse cache working in fixed-size pages.
///
/// The first read touching a page fetches the whole page. Cached bytes are
/// copied out of a read-only shared mapping of the local file, which sees
/// page writes made through the descriptor.
#[derive(Debug)]
pub struct CachedWrapper<R> {
    file: SparseFile,
    /// `None` for an empty source, which cannot be mapped
    map: Option<Mmap>,
    size: u64,
    pagesize: u64,
    multithread_safe: bool,
    inner: RwLock<PagedState<R>>,
}

impl<R: Read + Seek> CachedWrapper<R> {
    /// Wrap `source`, whose total length is `size`
    pub fn new(source: R, size: u64, options: SparseCacheOptions) -> Result<Self> {
        if options.pagesize == 0 {
            return Err(CacheError::configuration("pagesize must be greater than zero"));
        }

        let file = SparseFile::create(size, &options)?;
        let map = if size == 0 {
            None
        } else {
            // SAFETY: the file is sized once above and only written through
            // this wrapper, at offsets inside the mapping
            let map = unsafe { memmap2::MmapOptions::new().map(file.file()) }
                .map_err(|e| CacheError::io(file.path(), "memory-map sparse cache", e))?;
            Some(map)
        };

        let page_count = size.div_ceil(options.pagesize) as usize;
        Ok(Self {
            file,
            map,
            size,
            pagesize: options.pagesize,
            multithread_safe: options.multithread_safe,
            inner: RwLock::new(PagedState {
                source,
                pos: 0,
                pages: vec![false; page_count],
                state: CacheState::Open,
            }),
        })
    }

    /// Wrap `source`, measuring its length by seeking to the end
    pub fn from_source(mut source: R, options: SparseCacheOptions) -> Result<Self> {
        let size = source
            .seek(SeekFrom::End(0))
            .map_err(|e| CacheError::io(".", "measure source", e))?;
        Self::new(source, size, options)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn pagesize(&self) -> u64 {
        self.pagesize
    }

    pub fn tell(&self) -> u64 {
        self.inner.read().pos
    }

    pub fn multithread_safe(&self) -> bool {
        self.multithread_safe
    }

    pub fn cache_path(&self) -> &Path {
        self.file.path()
    }

    /// Cached and uncached extents, with neighbouring pages merged
    pub fn ranges(&self) -> Vec<ByteRange> {
        let inner = self.inner.read();
        let pages = inner.pages.iter().enumerate().map(|(page, cached)| {
            let (start, length) = self.page_span(page);
            ByteRange::new(start, length, *cached)
        });
        RangeList::from_ranges(self.size, pages).ranges().to_vec()
    }

    pub fn cached_bytes(&self) -> u64 {
        let inner = self.inner.read();
        inner
            .pages
            .iter()
            .enumerate()
            .filter(|(_, cached)| **cached)
            .map(|(page, _)| self.page_span(page).1)
            .sum()
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().state.is_frozen()
    }

    /// Persist the local file at `dest` and stop caching new pages.
    /// Reading an uncached page afterwards is an error.
    pub fn preserve(&self, dest: impl AsRef<Path>) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.state == CacheState::Closed {
            return Err(CacheError::closed("preserve"));
        }

        self.file.preserve(dest.as_ref())?;
        if inner.state == CacheState::Open {
            inner.state = CacheState::Frozen(FreezeReason::Preserved);
        }
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if std::mem::replace(&mut inner.state, CacheState::Closed) == CacheState::Closed {
            return Ok(());
        }
        self.file.remove()
    }

    /// Start and length of `page`; the last page may be short
    fn page_span(&self, page: usize) -> (u64, u64) {
        let start = page as u64 * self.pagesize;
        (start, self.pagesize.min(self.size - start))
    }

    fn read_into(&self, inner: &mut PagedState<R>, buf: &mut [u8]) -> Result<usize> {
        if inner.state == CacheState::Closed {
            return Err(CacheError::closed("read"));
        }

        let pos = inner.pos;
        let n = clamp_read(pos, self.size, buf.len());
        let Some(map) = self.map.as_ref().filter(|_| n > 0) else {
            return Ok(0);
        };

        let first = (pos / self.pagesize) as usize;
        let last = ((pos + n - 1) / self.pagesize) as usize;
        for page in first..=last {
            if inner.pages[page] {
                continue;
            }
            if inner.state.is_frozen() {
                return Err(CacheError::frozen("read uncached page"));
            }

            let (start, length) = self.page_span(page);
            let mut fetched = vec![0u8; length as usize];
            fetch_exact(&mut inner.source, start, &mut fetched)
                .map_err(|e| CacheError::io(self.file.path(), "fetch page from source", e))?;
            self.file.write_at(&fetched, start)?;
            inner.pages[page] = true;
        }

        let (lo, hi) = (pos as usize, (pos + n) as usize);
        buf[..hi - lo].copy_from_slice(&map[lo..hi]);
        inner.pos = pos + n;
        Ok(hi - lo)
    }

    fn seek_to(&self, inner: &mut PagedState<R>, target: SeekFrom) -> io::Result<u64> {
        inner.pos = resolve_seek(inner.pos, self.size, target)?;
        Ok(inner.pos)
    }
}

impl<R: Read + Seek> Read for CachedWrapper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.write();
        self.read_into(&mut inner, buf).map_err(io::Error::from)
    }
}

impl<R: Read + Seek> Read for &CachedWrapper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.write();
        self.read_into(&mut inner, buf).map_err(io::Error::from)
    }
}

impl<R: Read + Seek> Seek for CachedWrapper<R> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let mut inner = self.inner.write();
        self.seek_to(&mut inner, target)
    }
}

impl<R: Read + Seek> Seek for &CachedWrapper<R> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let mut inner = self.inner.write();
        self.seek_to(&mut inner, target)
    }
}

impl<R> Drop for CachedWrapper<R> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state != CacheState::Closed {
            inner.state = CacheState::Closed;
            if let Err(e) = self.file.remove() {
                tracing::warn!("failed to remove sparse cache file: {e}");
            }
        }
    }
}
