//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! host's call. [`setup_logging`] is a ready-made one for hosts and demos.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{DhipError, Result};

/// Install a global fmt subscriber honouring `RUST_LOG`, falling back to the configured level
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| DhipError::ConfigError(format!("Failed to install logger: {e}")))?;
    tracing::debug!(app = %config.app_name, "Logging initialized");
    Ok(())
}
