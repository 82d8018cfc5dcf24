//! Logging initialization
//!
//! Installs a process-wide `tracing` subscriber once at startup. The filter is
//! taken from `LOG_LEVEL`, then `RUST_LOG`, and defaults to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result, LOG_LEVEL_ENV};

/// Default filter directive when no environment override is present
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Build the log filter from the environment
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber (human-readable output to stderr)
pub fn init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(log_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
