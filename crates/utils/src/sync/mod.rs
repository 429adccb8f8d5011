//! Synchronisation primitives shared by the caches and sparse wrappers

pub mod rwlock;

pub use rwlock::{OptionalRwLock, OptionalReadGuard, OptionalWriteGuard};
