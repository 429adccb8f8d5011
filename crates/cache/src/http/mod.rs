//! Slot cache served by a remote HTTP endpoint
//!
//! Slot `i` lives at `{url}/{i}`. `PUT` with the raw bytes answers `201` when
//! stored; `GET` answers `200` with the bytes or `404` when the slot is
//! empty. Any other outcome is logged and treated as a miss, so a flaky
//! cache server slows a job down but never fails it.

mod pool;
mod token;

pub use pool::HttpConnectionPool;
pub use token::{BearerToken, TOKEN_REFRESH_INTERVAL};

use crate::config::HttpCacheConfig;
use crate::errors::{CacheError, Result};
use crate::state::{CacheState, StateCell};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::traits::{check_index, check_length, Cache};
use bytes::Bytes;
use reqwest::blocking::RequestBuilder;
use reqwest::StatusCode;
use std::sync::Arc;

#[derive(Debug)]
pub struct HttpCache {
    length: usize,
    base_url: String,
    pool: Arc<HttpConnectionPool>,
    token: Option<BearerToken>,
    state: StateCell,
    stats: CacheStats,
}

impl HttpCache {
    /// Create a cache with its own connection pool
    pub fn new(length: usize, config: &HttpCacheConfig) -> Result<Self> {
        let pool = Arc::new(HttpConnectionPool::new(config)?);
        Self::with_pool(length, config, pool)
    }

    /// Create a cache that shares `pool` with other caches
    pub fn with_pool(
        length: usize,
        config: &HttpCacheConfig,
        pool: Arc<HttpConnectionPool>,
    ) -> Result<Self> {
        check_length(length)?;
        url::Url::parse(&config.url).map_err(|e| {
            CacheError::configuration(format!("invalid cache url '{}': {e}", config.url))
        })?;

        Ok(Self {
            length,
            base_url: config.url.trim_end_matches('/').to_string(),
            pool,
            token: config.bearer_token_path.as_ref().map(BearerToken::new),
            state: StateCell::default(),
            stats: CacheStats::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn pool(&self) -> &Arc<HttpConnectionPool> {
        &self.pool
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    fn slot_url(&self, index: usize) -> String {
        format!("{}/{}", self.base_url, index)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            None => request,
            Some(token) => match token.get() {
                Ok(value) => request.bearer_auth(value),
                Err(e) => {
                    tracing::warn!("sending request without bearer token: {e}");
                    request
                }
            },
        }
    }

    fn fetch(&self, url: &str) -> Result<Option<Bytes>> {
        let response = self
            .pool
            .send("get", url, |client| self.authorize(client.get(url)))?;

        match response.status() {
            StatusCode::OK => response
                .bytes()
                .map(Some)
                .map_err(|e| CacheError::network(url, "read body", e)),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                tracing::warn!(url, %status, "unexpected response from cache server");
                Ok(None)
            }
        }
    }

    fn store(&self, url: &str, data: &[u8]) -> Result<bool> {
        let response = self.pool.send("put", url, |client| {
            self.authorize(client.put(url).body(data.to_vec()))
        })?;

        match response.status() {
            StatusCode::CREATED => Ok(true),
            status => {
                tracing::warn!(url, %status, "cache server did not store the blob");
                Ok(false)
            }
        }
    }
}

/// Network failures degrade to a miss; everything else propagates
fn soften<T>(result: Result<T>, fallback: T) -> Result<T> {
    match result {
        Err(e @ CacheError::Network { .. }) => {
            tracing::warn!("http cache request failed: {e}");
            Ok(fallback)
        }
        other => other,
    }
}

impl Cache for HttpCache {
    fn len(&self) -> usize {
        self.length
    }

    fn multiprocess_safe(&self) -> bool {
        true
    }

    fn multithread_safe(&self) -> bool {
        true
    }

    fn get(&self, index: usize) -> Result<Option<Bytes>> {
        check_index(index, self.length)?;
        if !self.state.get().is_readable() {
            return Ok(None);
        }

        let blob = soften(self.fetch(&self.slot_url(index)), None)?;
        if blob.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(blob)
    }

    fn put(&self, index: usize, data: &[u8]) -> Result<bool> {
        check_index(index, self.length)?;
        if !self.state.get().is_writable() {
            self.stats.record_rejected_put();
            return Ok(false);
        }

        let stored = soften(self.store(&self.slot_url(index), data), false)?;
        if stored {
            self.stats.record_put(data.len() as u64);
        } else {
            self.stats.record_rejected_put();
        }
        Ok(stored)
    }

    fn state(&self) -> CacheState {
        self.state.get()
    }

    fn close(&self) -> Result<()> {
        self.state.close();
        Ok(())
    }
}
