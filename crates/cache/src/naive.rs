//! In-memory reference cache

use crate::errors::Result;
use crate::state::{CacheState, StateCell};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::traits::{check_index, check_length, Cache};
use bytes::Bytes;
use std::sync::OnceLock;

/// Slot array held in memory.
///
/// Each slot is a [`OnceLock`], so the write-once rule holds even when
/// `multithread_safe` is `false`; the flag only describes how the instance
/// is meant to be shared. Out-of-range indices are rejected exactly like the
/// file-backed caches do.
#[derive(Debug)]
pub struct NaiveCache {
    slots: Vec<OnceLock<Bytes>>,
    multithread_safe: bool,
    state: StateCell,
    stats: CacheStats,
}

impl NaiveCache {
    pub fn new(length: usize, multithread_safe: bool) -> Result<Self> {
        check_length(length)?;

        Ok(Self {
            slots: (0..length).map(|_| OnceLock::new()).collect(),
            multithread_safe,
            state: StateCell::default(),
            stats: CacheStats::default(),
        })
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Cache for NaiveCache {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn multiprocess_safe(&self) -> bool {
        false
    }

    fn multithread_safe(&self) -> bool {
        self.multithread_safe
    }

    fn get(&self, index: usize) -> Result<Option<Bytes>> {
        check_index(index, self.slots.len())?;

        if !self.state.get().is_readable() {
            return Ok(None);
        }

        match self.slots[index].get() {
            Some(data) => {
                self.stats.record_hit();
                Ok(Some(data.clone()))
            }
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    fn put(&self, index: usize, data: &[u8]) -> Result<bool> {
        check_index(index, self.slots.len())?;

        if !self.state.get().is_writable() {
            self.stats.record_rejected_put();
            return Ok(false);
        }

        let stored = self.slots[index].set(Bytes::copy_from_slice(data)).is_ok();
        if stored {
            self.stats.record_put(data.len() as u64);
        } else {
            self.stats.record_rejected_put();
        }
        Ok(stored)
    }

    fn state(&self) -> CacheState {
        self.state.get()
    }

    fn close(&self) -> Result<()> {
        self.state.close();
        Ok(())
    }
}
