//! Core error types for the cache engine

use std::path::PathBuf;
use std::time::Duration;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Re-export CacheError as Error for convenience
pub use CacheError as Error;

/// Error type for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// I/O errors during cache operations
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Slot index outside `[0, length)`
    IndexOutOfRange {
        index: usize,
        length: usize,
        recovery_hint: RecoveryHint,
    },

    /// Invalid construction argument or settings value
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },

    /// Serialization/deserialization errors from a codec
    Serialization {
        key: String,
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// On-disk structures do not match the expected layout
    Corruption {
        key: String,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Operation needs a writable cache but it is frozen
    Frozen {
        operation: &'static str,
        recovery_hint: RecoveryHint,
    },

    /// Operation on a closed cache or wrapper
    Closed {
        operation: &'static str,
        recovery_hint: RecoveryHint,
    },

    /// Network error (for the HTTP cache)
    Network {
        endpoint: String,
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// Handle owner used from a forked child without reset
    Fork {
        resource: String,
        created_pid: u32,
        current_pid: u32,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Clear the cache and retry
    ClearAndRetry,

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Verify network connectivity
    CheckNetwork { endpoint: String },

    /// Check disk space and clean up if needed
    CheckDiskSpace,

    /// Update cache configuration
    UpdateConfiguration,

    /// Recreate cache file/directory
    Recreate,

    /// No automated recovery possible
    Manual { instructions: String },

    /// No recovery possible
    NoRecovery,
}

/// Serialization operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}

impl CacheError {
    /// Out-of-range slot index
    #[must_use]
    pub fn index_out_of_range(index: usize, length: usize) -> Self {
        Self::IndexOutOfRange {
            index,
            length,
            recovery_hint: RecoveryHint::NoRecovery,
        }
    }

    /// Invalid argument or settings value
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }

    /// I/O failure on a cache file
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        let path = path.into();
        let recovery_hint = match source.kind() {
            std::io::ErrorKind::PermissionDenied => RecoveryHint::CheckPermissions {
                path: path.clone(),
            },
            std::io::ErrorKind::NotFound => RecoveryHint::Recreate,
            std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock => {
                RecoveryHint::Retry {
                    after: Duration::from_millis(10),
                }
            }
            _ if is_disk_full(&source) => RecoveryHint::CheckDiskSpace,
            _ => RecoveryHint::NoRecovery,
        };
        Self::Io {
            path,
            operation,
            source,
            recovery_hint,
        }
    }

    /// Stored bytes do not match what the index promised
    #[must_use]
    pub fn corruption(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corruption {
            key: key.into(),
            reason: reason.into(),
            recovery_hint: RecoveryHint::ClearAndRetry,
        }
    }

    #[must_use]
    pub fn frozen(operation: &'static str) -> Self {
        Self::Frozen {
            operation,
            recovery_hint: RecoveryHint::Manual {
                instructions: "Frozen caches only serve bytes cached before the freeze"
                    .to_string(),
            },
        }
    }

    #[must_use]
    pub fn closed(operation: &'static str) -> Self {
        Self::Closed {
            operation,
            recovery_hint: RecoveryHint::Recreate,
        }
    }

    #[must_use]
    pub fn network(
        endpoint: impl Into<String>,
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let endpoint = endpoint.into();
        Self::Network {
            recovery_hint: RecoveryHint::CheckNetwork {
                endpoint: endpoint.clone(),
            },
            endpoint,
            operation,
            source: source.into(),
        }
    }
}

/// Whether an I/O error means the device ran out of space
pub(crate) fn is_disk_full(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENOSPC)
}
