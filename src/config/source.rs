//! Configuration sources
//!
//! This module defines traits and implementations for loading configuration
//! from different sources.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{debug, warn};

use crate::config::defaults::ENV_PREFIX;
use crate::config::error::{ConfigError, Result};
use crate::config::types::{ConfigValues, ValueSource};

/// Configuration source trait
pub trait ConfigSource {
    /// Load the values this source provides
    fn load(&self) -> Result<ConfigValues>;

    /// Get the source type
    fn source_type(&self) -> ValueSource;
}

/// JSON file configuration source
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    /// Create a new file source
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from file: {}", self.path.display());

        if !self.path.is_file() {
            warn!("Configuration file not found: {}", self.path.display());
            return Err(ConfigError::FileNotFound(self.path.clone()));
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileReadError(self.path.clone(), e.to_string()))?;

        let values: ConfigValues = serde_json::from_str(&contents)?;
        Ok(values)
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::File
    }
}

/// Environment variable configuration source
///
/// Reads `<prefix>LISTEN_HOST`, `<prefix>LISTEN_PORT`, `<prefix>TARGET_HOST`,
/// `<prefix>TARGET_PORT`, `<prefix>POLL_INTERVAL_MS`, `<prefix>BUFFER_SIZE`,
/// `<prefix>CONNECT_TIMEOUT` and `<prefix>LOG_LEVEL`.
pub struct EnvSource {
    pub prefix: String,
}

impl EnvSource {
    /// Create a new environment source with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn get(&self, name: &str) -> Option<String> {
        env::var(format!("{}{}", self.prefix, name)).ok()
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConfigError::InvalidValue(
                    format!("{}{}", self.prefix, name),
                    format!("'{}': {}", raw, e),
                )
            }),
            None => Ok(None),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from environment variables ({}*)", self.prefix);

        Ok(ConfigValues {
            listen_host: self.get("LISTEN_HOST"),
            listen_port: self.parse("LISTEN_PORT")?,
            target_host: self.get("TARGET_HOST"),
            target_port: self.parse("TARGET_PORT")?,
            poll_interval_ms: self.parse("POLL_INTERVAL_MS")?,
            buffer_size: self.parse("BUFFER_SIZE")?,
            connect_timeout: self.parse("CONNECT_TIMEOUT")?,
            log_level: self.get("LOG_LEVEL"),
        })
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Environment
    }
}

/// Values supplied directly by the caller, typically parsed command line arguments
pub struct ValuesSource(pub ConfigValues);

impl ConfigSource for ValuesSource {
    fn load(&self) -> Result<ConfigValues> {
        Ok(self.0.clone())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::CommandLine
    }
}
