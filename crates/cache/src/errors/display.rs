//! Display implementations for cache errors

use super::types::CacheError;
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::IndexOutOfRange { index, length, .. } => {
                write!(f, "Cache index {index} out of range for length {length}")
            }
            Self::Configuration { message, .. } => {
                write!(f, "Cache configuration error: {message}")
            }
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} cache entry '{key}': {source}"),
            Self::Corruption { key, reason, .. } => {
                write!(f, "Cache corruption detected for '{key}': {reason}")
            }
            Self::Frozen { operation, .. } => {
                write!(f, "Cannot {operation}: cache is frozen")
            }
            Self::Closed { operation, .. } => {
                write!(f, "Cannot {operation}: cache is closed")
            }
            Self::Network {
                endpoint,
                operation,
                source,
                ..
            } => write!(
                f,
                "Network error during {operation} with '{endpoint}': {source}"
            ),
            Self::Fork {
                resource,
                created_pid,
                current_pid,
                ..
            } => write!(
                f,
                "{resource} created in process {created_pid} used from process {current_pid} without reset"
            ),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } | Self::Network { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}
