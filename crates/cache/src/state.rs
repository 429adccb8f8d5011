//! Lifecycle of a cache
//!
//! ```text
//!   Open ──preserve/preload/size limit/disk full──▶ Frozen(reason)
//!    │                                                  │
//!    └──────────────────── close ───────────────────────┴──▶ Closed
//! ```
//!
//! Freezing is one-way and the first reason wins. `put` is accepted only in
//! `Open`; `get` is served in `Open` and `Frozen`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Why a cache stopped accepting writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreezeReason {
    /// Backing files were hard-linked to a shared name
    Preserved,
    /// Backing files were replaced by a previously preserved snapshot
    Preloaded,
    /// A `put` would have exceeded the cumulative byte budget
    SizeLimit,
    /// The device ran out of space during a `put`
    DiskFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheState {
    Open,
    Frozen(FreezeReason),
    Closed,
}

impl CacheState {
    pub fn is_writable(self) -> bool {
        self == CacheState::Open
    }

    pub fn is_readable(self) -> bool {
        self != CacheState::Closed
    }

    pub fn is_frozen(self) -> bool {
        matches!(self, CacheState::Frozen(_))
    }
}

/// Thread-safe holder enforcing the legal transitions
#[derive(Debug)]
pub struct StateCell(RwLock<CacheState>);

impl StateCell {
    pub fn new(state: CacheState) -> Self {
        Self(RwLock::new(state))
    }

    pub fn get(&self) -> CacheState {
        *self.0.read()
    }

    /// Move `Open` to `Frozen(reason)`. Returns whether this call froze it.
    pub fn freeze(&self, reason: FreezeReason) -> bool {
        let mut state = self.0.write();
        if *state == CacheState::Open {
            *state = CacheState::Frozen(reason);
            true
        } else {
            false
        }
    }

    /// Move to `Closed`, returning the previous state
    pub fn close(&self) -> CacheState {
        std::mem::replace(&mut *self.0.write(), CacheState::Closed)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(CacheState::Open)
    }
}
