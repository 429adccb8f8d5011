//! Blob caches for blobio
//!
//! This crate provides caches for immutable, index-addressed blobs such as
//! dataset samples:
//! - [`NaiveCache`]: in memory
//! - [`FileCache`]: an index/data file pair for one process
//! - [`MultiprocessFileCache`]: the same files shared across processes
//! - [`HttpCache`]: a remote cache server
//! - [`sparse`]: byte-range caching of large remote files
//!
//! Slots are written once. Caches can be frozen and shared by preserving
//! their files under a name that other instances preload.

pub mod codec;
pub mod config;
pub mod errors;
pub mod file;
pub mod http;
pub mod multiprocess;
pub mod naive;
pub mod record;
pub mod sparse;
pub mod state;
pub mod stats;
pub mod traits;

pub use codec::{BincodeCodec, Codec, CodecCache, RawCodec};
pub use config::{CacheConfig, CacheConfigBuilder, HttpCacheConfig};
pub use errors::{CacheError, Error, RecoveryHint, Result};
pub use file::FileCache;
pub use http::{BearerToken, HttpCache, HttpConnectionPool};
pub use multiprocess::{MultiprocessFileCache, MultiprocessFileCacheState};
pub use naive::NaiveCache;
pub use record::IndexRecord;
pub use sparse::{ByteRange, CachedWrapper, DynamicCachedWrapper, SparseCacheOptions};
pub use state::{CacheState, FreezeReason};
pub use stats::CacheStatsSnapshot;
pub use traits::Cache;
