//! Logging bootstrap

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Build the filter used by [`init`]: `RUST_LOG` wins, otherwise `level`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_directive()))
}

/// Install the global fmt subscriber.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init(level: LogLevel) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .try_init();

    if result.is_ok() {
        tracing::info!("Logging initialized at {}", level.as_directive());
    }
}
