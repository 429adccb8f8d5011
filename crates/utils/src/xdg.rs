use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory root
pub const CACHE_DIR_ENV: &str = "BLOBIO_CACHE_DIR";

/// Environment variable holding the cumulative byte budget for file caches
pub const CACHE_SIZE_LIMIT_ENV: &str = "BLOBIO_CACHE_SIZE_LIMIT";

/// Environment variable pointing at the HTTP cache bearer token file
pub const HTTP_BEARER_TOKEN_PATH_ENV: &str = "BLOBIO_HTTP_BEARER_TOKEN_PATH";

/// Well-known directories for blobio
pub struct XdgPaths;

impl XdgPaths {
    /// Get ~/.blobio or a relative fallback when no home directory exists
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".blobio"))
            .unwrap_or_else(|| PathBuf::from(".blobio"))
    }

    /// Get BLOBIO_CACHE_DIR or ~/.blobio/cache
    pub fn cache_dir() -> PathBuf {
        env::var_os(CACHE_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::home_dir().join("cache"))
    }

    /// Resolve the cache directory with the explicit value taking precedence
    pub fn resolve_cache_dir(explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(dir) => dir.to_path_buf(),
            None => Self::cache_dir(),
        }
    }

    /// Get the bearer token path configured through the environment, if any
    pub fn http_bearer_token_path() -> Option<PathBuf> {
        env::var_os(HTTP_BEARER_TOKEN_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}

/// Create the cache directory if it does not exist yet
pub fn ensure_cache_dir(explicit: Option<&Path>) -> blobio_core::Result<PathBuf> {
    let dir = XdgPaths::resolve_cache_dir(explicit);
    std::fs::create_dir_all(&dir)
        .map_err(|e| blobio_core::Error::file_system(&dir, "create cache directory", e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_cache_dir_env_override() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var(CACHE_DIR_ENV, temp_dir.path());
        assert_eq!(XdgPaths::cache_dir(), temp_dir.path());
        env::remove_var(CACHE_DIR_ENV);

        assert!(XdgPaths::cache_dir().ends_with(".blobio/cache"));
    }

    #[test]
    #[serial]
    fn test_explicit_dir_wins() {
        let temp_dir = TempDir::new().unwrap();
        env::set_var(CACHE_DIR_ENV, "/should/not/be/used");
        let resolved = XdgPaths::resolve_cache_dir(Some(temp_dir.path()));
        env::remove_var(CACHE_DIR_ENV);
        assert_eq!(resolved, temp_dir.path());
    }

    #[test]
    fn test_ensure_cache_dir_creates_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let dir = ensure_cache_dir(Some(&nested)).unwrap();
        assert!(dir.is_dir());
    }
}
