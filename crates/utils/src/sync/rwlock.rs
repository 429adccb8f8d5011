//! Reader-writer lock that can be compiled down to a no-op
//!
//! Caches built with `multithread_safe = false` still need a lock-shaped
//! object at their seams. The no-op variant hands out guards without touching
//! any atomic state. It is only sound where the protected data is itself
//! `Sync` (file descriptors used through positional I/O, atomics); the lock
//! then orders logical steps, not memory.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Any number of readers or exactly one writer, or nothing at all
#[derive(Debug)]
pub enum OptionalRwLock {
    /// Task-fair lock: queued writers block new readers, so writers never starve
    Shared(RwLock<()>),
    Noop,
}

/// Shared access guard, released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub enum OptionalReadGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Noop,
}

/// Exclusive access guard, released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub enum OptionalWriteGuard<'a> {
    Shared(RwLockWriteGuard<'a, ()>),
    Noop,
}

impl OptionalRwLock {
    pub fn new(multithread_safe: bool) -> Self {
        if multithread_safe {
            Self::Shared(RwLock::new(()))
        } else {
            Self::Noop
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    pub fn read(&self) -> OptionalReadGuard<'_> {
        match self {
            Self::Shared(lock) => OptionalReadGuard::Shared(lock.read()),
            Self::Noop => OptionalReadGuard::Noop,
        }
    }

    pub fn write(&self) -> OptionalWriteGuard<'_> {
        match self {
            Self::Shared(lock) => OptionalWriteGuard::Shared(lock.write()),
            Self::Noop => OptionalWriteGuard::Noop,
        }
    }
}
