//! Resilience patterns for network-facing collaborators.
//!
//! The local caches never retry; retries are confined to the HTTP cache and
//! remote filesystem backends.
//!
//! ## Examples
//!
//! ```rust
//! use blobio_utils::resilience::{retry, RetryConfig};
//!
//! let config = RetryConfig::default().with_max_retries(0);
//! let value: Result<u32, String> = retry(&config, |_| true, |_attempt| Ok(7));
//! assert_eq!(value, Ok(7));
//! ```

pub mod retry;

pub use retry::{retry, RetryConfig};
