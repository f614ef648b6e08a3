//! # Logging
//!
//! Both crates log through `tracing`. This module installs the subscriber:
//! an `EnvFilter` taken from `RUST_LOG` when set, otherwise from the
//! configured level, and a fmt layer.

pub mod config;

pub use config::{LogLevel, LoggingConfig};

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed, which callers that may run
/// more than once (tests, embedding) can ignore.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .context("building log filter")?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(config.enable_colors)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!(level = %config.level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        let config = LoggingConfig {
            enable_colors: false,
            ..LoggingConfig::default()
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
