//! Thin logging helpers over `tracing`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ZENTARA_LOG";

/// Install the global subscriber. `ZENTARA_LOG` takes precedence over
/// `verbose`. Calling this twice is harmless.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn info(message: impl Into<String>) {
    let message = message.into();
    tracing::info!("{message}");
}

pub fn warn(message: impl Into<String>) {
    let message = message.into();
    tracing::warn!("{message}");
}

pub fn error(message: impl Into<String>) {
    let message = message.into();
    tracing::error!("{message}");
}
