//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use ::tracing::{debug, error, info, instrument, trace, warn, Level};

/// Initialize the tracing system
///
/// Honours `RUST_LOG` and falls back to `info`. Writes compact lines to stderr.
/// Returns an error when a global subscriber is already installed, which
/// callers that may initialise more than once (tests) can ignore.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        // Another test in this binary may already own the global subscriber
        let _ = init();
        assert!(init().is_err());
        info!(target: "blobio", "subscriber installed");
    }
}
