//! Shared utilities for blobio
//!
//! This crate provides the small pieces of plumbing used by the cache engine
//! and the filesystem backends: cache directory resolution, an optional
//! reader-writer lock, fork detection for objects that own OS handles, and a
//! blocking retry helper for network-facing collaborators.

pub mod file_lock;
pub mod fork;
pub mod resilience;
pub mod sync;
pub mod tracing;
pub mod xdg;

pub use file_lock::*;
pub use fork::*;
pub use resilience::*;
pub use sync::*;
pub use xdg::*;
