//! `tracing` subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

use crate::config::Config;

const DEFAULT_FILTER: &str = "warn";

/// Builds the log filter: `NOTEMAKER_LOG`, then `RUST_LOG`, then `warn`.
pub fn env_filter(config: &Config) -> EnvFilter {
    config
        .log_filter
        .as_deref()
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a stderr fmt subscriber.
///
/// Does nothing if a global subscriber is already set.
pub fn init(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
