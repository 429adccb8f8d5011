//! Filesystem backends for blobio
//!
//! Client code addresses files through the [`FileSystem`] trait regardless of
//! where they live. The crate ships the local POSIX backend and a static
//! registry that maps URL schemes to backend factories; remote stores plug in
//! by registering their own factory.

pub mod backend;
pub mod listing;
pub mod local;
pub mod registry;

pub use backend::{FileHandle, FileStat, FileSystem, OpenMode};
pub use listing::Listing;
pub use local::Local;
pub use registry::{default_registry, from_url, BackendFactory, FsRegistry};
