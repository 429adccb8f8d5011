//! Explicit, fork-aware HTTP connection pool

use crate::config::HttpCacheConfig;
use crate::errors::{CacheError, Result};
use blobio_utils::fork::{ForkGuard, ForkPolicy};
use blobio_utils::resilience::{retry, RetryConfig};
use parking_lot::RwLock;
use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;

/// A blocking HTTP client shared by reference between caches.
///
/// Connections are reused across requests. After a `fork()` the inherited
/// client is unusable (its worker thread did not survive), so depending on
/// the [`ForkPolicy`] the pool either builds a new client or refuses.
#[derive(Debug)]
pub struct HttpConnectionPool {
    client: RwLock<Client>,
    connect_timeout: Duration,
    timeout: Duration,
    retry: RetryConfig,
    fork: ForkGuard,
}

impl HttpConnectionPool {
    pub fn new(config: &HttpCacheConfig) -> Result<Self> {
        Self::with_policy(config, ForkPolicy::Reset)
    }

    pub fn with_policy(config: &HttpCacheConfig, policy: ForkPolicy) -> Result<Self> {
        let client = build_client(config.connect_timeout, config.timeout)?;
        Ok(Self {
            client: RwLock::new(client),
            connect_timeout: config.connect_timeout,
            timeout: config.timeout,
            retry: RetryConfig::for_network().with_max_retries(config.retries),
            fork: ForkGuard::new("http connection pool", policy),
        })
    }

    /// Replace the backoff schedule
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Rebuild the client if the calling process is not the one that built
    /// it. Returns whether a new client was built.
    pub fn reset_if_forked(&self) -> Result<bool> {
        if !self.fork.check()? {
            return Ok(false);
        }

        let fresh = build_client(self.connect_timeout, self.timeout)?;
        let inherited = std::mem::replace(&mut *self.client.write(), fresh);
        // Deliberate leak: dropping would join a worker thread that does not
        // exist in the child. The fork guard re-arms on the new pid, so this
        // happens at most once per process.
        std::mem::forget(inherited);
        tracing::debug!(pid = std::process::id(), "rebuilt http client after fork");
        Ok(true)
    }

    /// A handle to the client valid in the calling process
    pub fn client(&self) -> Result<Client> {
        self.reset_if_forked()?;
        Ok(self.client.read().clone())
    }

    /// Send the request built by `build`, retrying transport failures and
    /// 5xx responses. Other statuses are returned to the caller.
    pub fn send<F>(&self, operation: &'static str, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let client = self.client()?;
        retry(&self.retry, CacheError::is_transient, |_attempt| {
            let response = build(&client)
                .send()
                .map_err(|e| CacheError::network(url, operation, e))?;

            let status = response.status();
            if status.is_server_error() {
                return Err(CacheError::network(
                    url,
                    operation,
                    format!("server responded with {status}"),
                ));
            }
            Ok(response)
        })
    }
}

fn build_client(connect_timeout: Duration, timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| CacheError::network("", "build http client", e))
}
