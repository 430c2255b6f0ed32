//! Configuration module
//!
//! This module handles bridge configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the result.
//!
//! Sources are layered from lowest to highest priority:
//! defaults < configuration file < environment < command line.

mod defaults;
mod error;
mod source;
mod types;
mod validator;

pub use self::defaults::{
    ENV_PREFIX, LOG_LEVEL_STR, POLL_INTERVAL_MS, BUFFER_SIZE, MAX_BUFFER_SIZE, CONNECT_TIMEOUT_SECS,
    LISTEN_BACKLOG,
};
pub use self::error::{ConfigError, Result};
pub use self::source::{ConfigSource, EnvSource, FileSource, ValuesSource};
pub use self::types::{BridgeConfig, BridgeSettings, ConfigValues, ValueSource};
pub use self::validator::{check_warnings, validate_config};

use log::debug;

/// Merge the given sources in order and build a validated configuration
///
/// Later sources override earlier ones.
pub fn load_config(sources: &[&dyn ConfigSource]) -> Result<BridgeConfig> {
    let mut values = ConfigValues::default();

    for source in sources {
        debug!("Applying configuration source: {}", source.source_type());
        values = values.merge(source.load()?);
    }

    let config = values.build()?;
    validate_config(&config)?;

    Ok(config)
}
