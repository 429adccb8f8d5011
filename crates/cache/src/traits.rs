//! The contract shared by every slot cache

use crate::errors::{CacheError, Result};
use crate::state::CacheState;
use bytes::Bytes;

/// A fixed-size mapping from slot index to an immutable blob.
///
/// Slots are written at most once. `put` on a filled slot, or on a cache that
/// is frozen or closed, returns `Ok(false)`; callers may race `put` freely.
/// Every implementation rejects indices outside `[0, len())` with
/// [`CacheError::IndexOutOfRange`].
pub trait Cache: Send + Sync {
    /// Number of slots, fixed at construction
    fn len(&self) -> usize;

    /// Always `false`: caches are constructed with at least one slot
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether one instance may be shared by several processes
    fn multiprocess_safe(&self) -> bool;

    /// Whether one instance may be shared by several threads
    fn multithread_safe(&self) -> bool;

    /// Blob stored at `index`, or `None` if unwritten or closed
    fn get(&self, index: usize) -> Result<Option<Bytes>>;

    /// Store `data` at `index`. `Ok(true)` if this call wrote the slot.
    fn put(&self, index: usize, data: &[u8]) -> Result<bool>;

    fn state(&self) -> CacheState;

    /// Release resources. Further `get`s return `None`, `put`s return `false`.
    fn close(&self) -> Result<()>;

    /// Return the cached blob, or fetch, store and return it.
    ///
    /// Not atomic: concurrent callers may both miss and both fetch. The
    /// second `put` is rejected, so the only cost is the duplicate fetch.
    /// Errors from `fetch` propagate unchanged.
    fn get_and_cache<F, E>(&self, index: usize, fetch: F) -> std::result::Result<Bytes, E>
    where
        Self: Sized,
        F: FnOnce(usize) -> std::result::Result<Vec<u8>, E>,
        E: From<CacheError>,
    {
        if let Some(data) = self.get(index)? {
            return Ok(data);
        }

        let data = fetch(index)?;
        if !self.put(index, &data)? {
            tracing::trace!(index, "fetched value was not stored");
        }
        Ok(Bytes::from(data))
    }
}

/// Reject indices outside `[0, length)`
pub(crate) fn check_index(index: usize, length: usize) -> Result<()> {
    if index < length {
        Ok(())
    } else {
        Err(CacheError::index_out_of_range(index, length))
    }
}

/// Reject a zero-slot cache at construction
pub(crate) fn check_length(length: usize) -> Result<()> {
    if length == 0 {
        return Err(CacheError::configuration(
            "cache length must be greater than zero",
        ));
    }
    Ok(())
}
