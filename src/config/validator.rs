//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::LevelFilter;

use crate::config::defaults::{LOG_LEVEL_STR, MAX_BUFFER_SIZE};
use crate::config::error::{ConfigError, Result};
use crate::config::types::BridgeConfig;

/// Validate the configuration
///
/// Only hard errors are reported here; see [`check_warnings`] for the rest.
pub fn validate_config(config: &BridgeConfig) -> Result<()> {
    validate_endpoints(config)?;
    validate_settings(config)?;

    Ok(())
}

/// Validate endpoint values
fn validate_endpoints(config: &BridgeConfig) -> Result<()> {
    if config.listen_host.trim().is_empty() {
        return Err(ConfigError::InvalidValue(
            "listen_host".to_string(),
            "Host must not be empty".to_string(),
        ));
    }

    if config.target_host.trim().is_empty() {
        return Err(ConfigError::InvalidValue(
            "target_host".to_string(),
            "Host must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validate tuning settings
fn validate_settings(config: &BridgeConfig) -> Result<()> {
    if config.settings.buffer_size == 0 {
        return Err(ConfigError::InvalidValue(
            "buffer_size".to_string(),
            "Buffer size must be greater than 0".to_string(),
        ));
    }

    // Every connection allocates one buffer of this size
    if config.settings.buffer_size > MAX_BUFFER_SIZE {
        return Err(ConfigError::InvalidValue(
            "buffer_size".to_string(),
            format!("Buffer size must not exceed {} bytes", MAX_BUFFER_SIZE),
        ));
    }

    if config.settings.poll_interval.is_zero() {
        return Err(ConfigError::InvalidValue(
            "poll_interval_ms".to_string(),
            "Poll interval must be greater than 0".to_string(),
        ));
    }

    if config.settings.connect_timeout.is_zero() {
        return Err(ConfigError::InvalidValue(
            "connect_timeout".to_string(),
            "Connection timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Collect non-fatal problems with the configuration
pub fn check_warnings(config: &BridgeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.log_level.trim().parse::<LevelFilter>().is_err() {
        warnings.push(format!(
            "Invalid log level '{}', using default '{}'",
            config.log_level, LOG_LEVEL_STR
        ));
    }

    if config.listen_host == config.target_host && config.listen_port == config.target_port {
        warnings.push(format!(
            "Listen and target addresses are identical ({}:{}); connections will loop back into the bridge",
            config.listen_host, config.listen_port
        ));
    }

    warnings
}
