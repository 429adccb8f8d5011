//! Bearer token read from a file and refreshed without a background thread

use crate::errors::{CacheError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Minimum age before the token file is read again
pub const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct BearerToken {
    path: PathBuf,
    cached: Mutex<Option<(Instant, String)>>,
}

impl BearerToken {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current token, re-read from disk if the cached copy is stale
    pub fn get(&self) -> Result<String> {
        let mut cached = self.cached.lock();
        if let Some((read_at, token)) = cached.as_ref() {
            if read_at.elapsed() <= TOKEN_REFRESH_INTERVAL {
                return Ok(token.clone());
            }
        }

        let token = std::fs::read_to_string(&self.path)
            .map_err(|e| CacheError::io(&self.path, "read bearer token", e))?
            .trim()
            .to_string();
        *cached = Some((Instant::now(), token.clone()));
        Ok(token)
    }
}
