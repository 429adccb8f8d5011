//! Core error types shared by every `blobio` crate.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias used
//!   by the filesystem backends and the shared utilities. The cache engine has
//!   its own richer `CacheError` and converts from this one.

pub mod errors;

pub use self::errors::{Error, Result};
