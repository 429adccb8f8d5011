//! Error conversion utilities

use super::types::{CacheError, RecoveryHint, SerializationOp};
use std::path::PathBuf;

impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        CacheError::io(PathBuf::from("."), "unknown", error)
    }
}

impl From<bincode::Error> for CacheError {
    fn from(error: bincode::Error) -> Self {
        Self::Serialization {
            key: String::new(),
            operation: SerializationOp::Decode,
            source: error,
            recovery_hint: RecoveryHint::ClearAndRetry,
        }
    }
}

impl From<blobio_core::Error> for CacheError {
    fn from(error: blobio_core::Error) -> Self {
        match error {
            blobio_core::Error::ForkedWithoutReset {
                resource,
                created_pid,
                current_pid,
            } => Self::Fork {
                resource,
                created_pid,
                current_pid,
                recovery_hint: RecoveryHint::Manual {
                    instructions: "Recreate the resource in the child or use ForkPolicy::Reset"
                        .to_string(),
                },
            },
            blobio_core::Error::FileSystem {
                path,
                operation,
                source,
            } => {
                tracing::trace!(%operation, "converting filesystem error");
                CacheError::io(path, "filesystem operation", source)
            }
            blobio_core::Error::Network { endpoint, message } => {
                CacheError::network(endpoint, "request", message)
            }
            other => CacheError::configuration(other.to_string()),
        }
    }
}

/// Convert cache errors to core errors
impl From<CacheError> for blobio_core::Error {
    fn from(error: CacheError) -> Self {
        blobio_core::Error::Configuration {
            message: error.to_string(),
        }
    }
}

/// Surface cache errors through `std::io::Read`/`Seek` implementations
impl From<CacheError> for std::io::Error {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Io { source, .. } => source,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
