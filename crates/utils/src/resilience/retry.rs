//! Blocking retry with exponential backoff and jitter

use std::thread::sleep;
use std::time::Duration;

/// Default maximum number of retry attempts
const DEFAULT_MAX_RETRIES: usize = 3;

/// Default base delay for exponential backoff (100ms)
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay for exponential backoff (10s)
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default jitter factor (0.1 = 10% randomization)
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Jitter factor for randomization (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Create a retry config for network operations
    pub fn for_network() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.2,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Calculate delay for a given attempt with exponential backoff and jitter
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31) as u32);
        let exponential_delay = self.base_delay.saturating_mul(factor);
        let capped_delay = exponential_delay.min(self.max_delay);

        if self.jitter_factor <= 0.0 {
            return capped_delay;
        }

        // Uniform in [-jitter_factor, +jitter_factor] of the capped delay
        let jitter_range = capped_delay.as_millis() as f64 * self.jitter_factor;
        let normalized = (rand::random::<f64>() - 0.5) * 2.0;
        let final_millis = (capped_delay.as_millis() as f64 + normalized * jitter_range).max(0.0);
        Duration::from_millis(final_millis as u64)
    }
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// attempts are exhausted. The closure receives the zero-based attempt number.
pub fn retry<T, E, F, P>(config: &RetryConfig, should_retry: P, mut operation: F) -> Result<T, E>
where
    F: FnMut(usize) -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation(attempt) {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!("Operation succeeded after {attempt} retries");
                }
                return Ok(result);
            }
            Err(error) if attempt < config.max_retries && should_retry(&error) => {
                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    delay,
                    error
                );
                sleep(delay);
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
