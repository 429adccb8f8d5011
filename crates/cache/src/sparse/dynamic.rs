use super::range::{ByteRange, RangeList};
use super::store::SparseFile;
use super::{clamp_read, fetch_exact, resolve_seek, SparseCacheOptions};
use crate::errors::{CacheError, Result};
use crate::state::{CacheState, FreezeReason};
use parking_lot::RwLock;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug)]
struct DynamicState<R> {
    source: R,
    pos: u64,
    ranges: RangeList,
    state: CacheState,
}

/// Sparse cache tracking arbitrary byte ranges.
///
/// A read fetches exactly the uncached parts of the requested span, writes
/// them to the local file and marks them cached. Neighbouring cached ranges
/// are merged so the list stays short for sequential access.
#[derive(Debug)]
pub struct DynamicCachedWrapper<R> {
    file: SparseFile,
    size: u64,
    multithread_safe: bool,
    inner: RwLock<DynamicState<R>>,
}

impl<R: Read + Seek> DynamicCachedWrapper<R> {
    /// Wrap `source`, whose total length is `size`
    pub fn new(source: R, size: u64, options: SparseCacheOptions) -> Result<Self> {
        let file = SparseFile::create(size, &options)?;

        Ok(Self {
            file,
            size,
            multithread_safe: options.multithread_safe,
            inner: RwLock::new(DynamicState {
                source,
                pos: 0,
                ranges: RangeList::new(size),
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

    pub fn tell(&self) -> u64 {
        self.inner.read().pos
    }

    pub fn multithread_safe(&self) -> bool {
        self.multithread_safe
    }

    pub fn cache_path(&self) -> &Path {
        self.file.path()
    }

    /// Snapshot of the range list
    pub fn ranges(&self) -> Vec<ByteRange> {
        self.inner.read().ranges.ranges().to_vec()
    }

    pub fn cached_bytes(&self) -> u64 {
        self.inner.read().ranges.cached_bytes()
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().state.is_frozen()
    }

    /// Persist the local file at `dest` and stop caching new bytes.
    /// Reading an uncached byte afterwards is an error.
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

    fn read_into(file: &SparseFile, inner: &mut DynamicState<R>, buf: &mut [u8]) -> Result<usize> {
        if inner.state == CacheState::Closed {
            return Err(CacheError::closed("read"));
        }

        let pos = inner.pos;
        let n = clamp_read(pos, inner.ranges.size(), buf.len());
        for piece in inner.ranges.plan(pos, n) {
            let lo = (piece.start - pos) as usize;
            let dst = &mut buf[lo..lo + piece.length as usize];

            if piece.cached {
                file.read_at(dst, piece.start)?;
                continue;
            }
            if inner.state.is_frozen() {
                return Err(CacheError::frozen("read uncached bytes"));
            }

            fetch_exact(&mut inner.source, piece.start, dst)
                .map_err(|e| CacheError::io(file.path(), "fetch from source", e))?;
            file.write_at(dst, piece.start)?;
            inner.ranges.mark_cached(piece.start, piece.length);
        }

        inner.pos = pos + n;
        Ok(n as usize)
    }

    fn seek_to(inner: &mut DynamicState<R>, target: SeekFrom) -> io::Result<u64> {
        inner.pos = resolve_seek(inner.pos, inner.ranges.size(), target)?;
        Ok(inner.pos)
    }
}

impl<R: Read + Seek> Read for DynamicCachedWrapper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Self::read_into(&self.file, self.inner.get_mut(), buf).map_err(io::Error::from)
    }
}

impl<R: Read + Seek> Read for &DynamicCachedWrapper<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.write();
        DynamicCachedWrapper::read_into(&self.file, &mut inner, buf).map_err(io::Error::from)
    }
}

impl<R: Read + Seek> Seek for DynamicCachedWrapper<R> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        Self::seek_to(self.inner.get_mut(), target)
    }
}

impl<R: Read + Seek> Seek for &DynamicCachedWrapper<R> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        DynamicCachedWrapper::seek_to(&mut self.inner.write(), target)
    }
}

impl<R> Drop for DynamicCachedWrapper<R> {
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
