//! Configuration loading and parsing.
//!
//! Precedence, lowest first:
//! 1. Default values
//! 2. Configuration file (TOML)
//! 3. Environment variables (`QUICD_` prefix, `__` separator)

use anyhow::{Context, Result};
use config::Config as ConfigLoader;
use std::path::Path;

use super::EndpointConfig;
use crate::telemetry::LogLevel;

/// Load, override and validate the endpoint configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be read or parsed
/// - Validation fails
pub fn load_config(path: impl AsRef<Path>) -> Result<EndpointConfig> {
    load_config_with_prefix(path, "QUICD")
}

/// [`load_config`] with a custom environment prefix.
pub fn load_config_with_prefix(path: impl AsRef<Path>, env_prefix: &str) -> Result<EndpointConfig> {
    let mut config = load_config_file(path.as_ref())?;
    apply_env_overrides(&mut config, env_prefix)?;

    config.validate().map_err(|errors| {
        anyhow::anyhow!("Configuration validation failed:\n{}", errors.join("\n"))
    })?;

    Ok(config)
}

/// Load configuration from a TOML file.
fn load_config_file(path: &Path) -> Result<EndpointConfig> {
    if !path.exists() {
        tracing::warn!(
            config_path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(EndpointConfig::default());
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Apply environment variable overrides.
///
/// Examples:
/// - `QUICD_NETIO__POLL_INTERVAL_MS=50`
/// - `QUICD_TRANSPORT__MAX_PACKET_SIZE=1350`
/// - `QUICD_LOGGING__LEVEL=debug`
fn apply_env_overrides(config: &mut EndpointConfig, prefix: &str) -> Result<()> {
    let env_config = ConfigLoader::builder()
        .add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to load environment variables")?;

    let uint = |key: &str| -> Option<u64> {
        let value = env_config.get_int(key).ok()?;
        match u64::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value, "Negative value in environment, ignoring");
                None
            }
        }
    };

    if let Some(v) = uint("netio.poll_interval_ms") {
        config.netio.poll_interval_ms = v;
    }
    if let Some(v) = uint("netio.max_datagram_size") {
        config.netio.max_datagram_size = v as usize;
    }
    if let Some(v) = uint("transport.max_packet_size") {
        config.transport.max_packet_size = v as usize;
    }
    if let Some(v) = uint("transport.min_initial_size") {
        config.transport.min_initial_size = v as usize;
    }
    if let Some(v) = uint("transport.idle_timeout_ms") {
        config.transport.idle_timeout_ms = v;
    }
    if let Ok(level) = env_config.get_string("logging.level") {
        match level.parse::<LogLevel>() {
            Ok(parsed) => config.logging.level = parsed,
            Err(_) => tracing::warn!(level = %level, "Invalid log level specified, ignoring"),
        }
    }

    Ok(())
}
