//! Cache configuration with precedence and validation
//!
//! Precedence, highest first: values set on the builder, environment
//! variables, built-in defaults.

use crate::errors::{CacheError, Result};
use blobio_utils::xdg::{XdgPaths, CACHE_DIR_ENV, CACHE_SIZE_LIMIT_ENV};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by the file-backed caches and the sparse wrappers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for backing files; `None` resolves through `BLOBIO_CACHE_DIR`
    pub cache_dir: Option<PathBuf>,
    /// Cumulative byte budget for `put`; `None` is unlimited
    pub cache_size_limit: Option<u64>,
    /// Guard the instance with a reader-writer lock
    pub multithread_safe: bool,
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Defaults overlaid with the `BLOBIO_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            config.cache_dir = Some(PathBuf::from(dir));
        }

        if let Ok(limit) = std::env::var(CACHE_SIZE_LIMIT_ENV) {
            config.cache_size_limit = Some(parse_size_limit(&limit)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // A zero budget is valid: it freezes on the first non-empty put
        if matches!(&self.cache_dir, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(CacheError::configuration("cache_dir must not be empty"));
        }
        Ok(())
    }

    /// The directory backing files are created in
    pub fn resolved_cache_dir(&self) -> PathBuf {
        XdgPaths::resolve_cache_dir(self.cache_dir.as_deref())
    }
}

/// Parse a byte budget given as text
pub fn parse_size_limit(value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        CacheError::configuration(format!(
            "invalid cache size limit '{value}': expected a non-negative integer"
        ))
    })
}

/// Builder for creating cache configurations
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_size_limit: Option<u64>,
    multithread_safe: Option<bool>,
    use_env: bool,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn cache_size_limit(mut self, limit: u64) -> Self {
        self.cache_size_limit = Some(limit);
        self
    }

    pub fn multithread_safe(mut self, enabled: bool) -> Self {
        self.multithread_safe = Some(enabled);
        self
    }

    /// Fill unset values from the environment
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    pub fn build(self) -> Result<CacheConfig> {
        let base = if self.use_env {
            CacheConfig::from_env()?
        } else {
            CacheConfig::default()
        };

        let config = CacheConfig {
            cache_dir: self.cache_dir.or(base.cache_dir),
            cache_size_limit: self.cache_size_limit.or(base.cache_size_limit),
            multithread_safe: self.multithread_safe.unwrap_or(base.multithread_safe),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Default connect timeout for the HTTP cache
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default request timeout for the HTTP cache
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry count for the HTTP cache
const DEFAULT_RETRIES: usize = 3;

/// Settings for [`crate::http::HttpCache`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCacheConfig {
    /// Base URL; slot `i` lives at `{url}/{i}`
    pub url: String,
    /// File holding a bearer token; falls back to `BLOBIO_HTTP_BEARER_TOKEN_PATH`
    pub bearer_token_path: Option<PathBuf>,
    pub retries: usize,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl HttpCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token_path: XdgPaths::http_bearer_token_path(),
            retries: DEFAULT_RETRIES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_bearer_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.bearer_token_path = Some(path.into());
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_size_limit() {
        assert_eq!(parse_size_limit("1024").unwrap(), 1024);
        assert_eq!(parse_size_limit(" 7 ").unwrap(), 7);
        assert_eq!(parse_size_limit("0").unwrap(), 0);
        assert!(parse_size_limit("-5").is_err());
        assert!(parse_size_limit("1.5").is_err());
        assert!(parse_size_limit("lots").is_err());
    }

    /// Clears the listed variables on drop, including after a failed assertion
    struct EnvReset(&'static [&'static str]);

    impl Drop for EnvReset {
        fn drop(&mut self) {
            for name in self.0 {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_env_precedence() {
        let _reset = EnvReset(&[CACHE_DIR_ENV, CACHE_SIZE_LIMIT_ENV]);
        std::env::set_var(CACHE_DIR_ENV, "/from/env");
        std::env::set_var(CACHE_SIZE_LIMIT_ENV, "4096");

        let from_env = CacheConfig::builder().with_env().build().unwrap();
        assert_eq!(from_env.cache_dir, Some(PathBuf::from("/from/env")));
        assert_eq!(from_env.cache_size_limit, Some(4096));

        let explicit = CacheConfig::builder()
            .cache_dir("/explicit")
            .with_env()
            .build()
            .unwrap();
        assert_eq!(explicit.cache_dir, Some(PathBuf::from("/explicit")));
        assert_eq!(explicit.cache_size_limit, Some(4096));

        std::env::set_var(CACHE_SIZE_LIMIT_ENV, "not-a-number");
        let err = CacheConfig::from_env().unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));

        std::env::set_var(CACHE_SIZE_LIMIT_ENV, "0");
        assert_eq!(CacheConfig::from_env().unwrap().cache_size_limit, Some(0));
    }

    #[test]
    fn test_zero_limit_accepted() {
        let config = CacheConfig::builder().cache_size_limit(0).build().unwrap();
        assert_eq!(config.cache_size_limit, Some(0));
    }

    #[test]
    fn test_empty_cache_dir_rejected() {
        let err = CacheConfig::builder().cache_dir("").build().unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_config_serializes() {
        let config = CacheConfig::builder()
            .cache_dir("/tmp/cache")
            .cache_size_limit(10)
            .multithread_safe(true)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
