use std::path::PathBuf;

/// Result type alias for blobio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for blobio operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Path does not exist on the backend
    #[error("no such file or directory: '{path}'")]
    NotFound { path: PathBuf },

    /// Operation the backend cannot express (e.g. directories on object stores)
    #[error("unsupported operation '{operation}' on {backend} backend: {message}")]
    Unsupported {
        backend: String,
        operation: String,
        message: String,
    },

    /// Network-related errors
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// A resource that holds OS handles was used in a forked child without reset
    #[error(
        "{resource} created in process {created_pid} was used from process {current_pid} without reset"
    )]
    ForkedWithoutReset {
        resource: String,
        created_pid: u32,
        current_pid: u32,
    },
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    ///
    /// `NotFound` I/O errors are mapped onto [`Error::NotFound`] so callers can
    /// match on a missing path without digging into the source.
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Error::NotFound { path };
        }
        Error::FileSystem {
            path,
            operation: operation.into(),
            source,
        }
    }

    /// Create an unsupported operation error
    #[must_use]
    pub fn unsupported(
        backend: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Unsupported {
            backend: backend.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a fork misuse error
    #[must_use]
    pub fn forked_without_reset(resource: impl Into<String>, created_pid: u32) -> Self {
        Error::ForkedWithoutReset {
            resource: resource.into(),
            created_pid,
            current_pid: std::process::id(),
        }
    }

    /// Whether the error is worth retrying
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_file_system_maps_not_found() {
        let err = Error::file_system(
            "/missing",
            "stat",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, Error::NotFound { .. }));

        let err = Error::file_system(
            "/denied",
            "open",
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, Error::FileSystem { .. }));
        assert!(err.to_string().contains("/denied"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::network("http://localhost", "refused").is_transient());
        assert!(!Error::configuration("bad").is_transient());
        let err = Error::file_system("/x", "read", io::Error::from(io::ErrorKind::Interrupted));
        assert!(err.is_transient());
    }
}
