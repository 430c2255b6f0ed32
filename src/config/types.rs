//! Configuration types
//!
//! This module contains the main configuration types used throughout the application.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::common;
use crate::config::defaults;
use crate::config::error::{ConfigError, Result};

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// Default value
    Default,
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Partial configuration as produced by a single source
///
/// Every field is optional so that layers can be merged; a complete
/// [`BridgeConfig`] is obtained with [`ConfigValues::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigValues {
    // --- Endpoints (required) ---

    /// Host to listen on
    pub listen_host: Option<String>,

    /// Port to listen on
    pub listen_port: Option<u16>,

    /// Host every accepted connection is relayed to
    pub target_host: Option<String>,

    /// Port every accepted connection is relayed to
    pub target_port: Option<u16>,

    // --- Tuning ---

    /// Poll interval for accept and readiness waits, in milliseconds
    pub poll_interval_ms: Option<u64>,

    /// Read chunk size in bytes
    pub buffer_size: Option<usize>,

    /// Upstream connect timeout in seconds
    pub connect_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: Option<String>,
}

impl ConfigValues {
    /// Layer `other` on top of `self`; values set in `other` win
    pub fn merge(self, other: ConfigValues) -> ConfigValues {
        ConfigValues {
            listen_host: other.listen_host.or(self.listen_host),
            listen_port: other.listen_port.or(self.listen_port),
            target_host: other.target_host.or(self.target_host),
            target_port: other.target_port.or(self.target_port),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            buffer_size: other.buffer_size.or(self.buffer_size),
            connect_timeout: other.connect_timeout.or(self.connect_timeout),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Turn the merged layers into a complete configuration
    ///
    /// Fails if any of the four endpoint values is missing.
    pub fn build(self) -> Result<BridgeConfig> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| ConfigError::MissingRequiredValue(name.to_string()))
        }

        let settings = BridgeSettings {
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(defaults::poll_interval),
            buffer_size: self.buffer_size.unwrap_or_else(defaults::buffer_size),
            connect_timeout: self
                .connect_timeout
                .map(Duration::from_secs)
                .unwrap_or_else(defaults::connect_timeout),
        };

        Ok(BridgeConfig {
            listen_host: required(self.listen_host, "listen_host")?,
            listen_port: required(self.listen_port, "listen_port")?,
            target_host: required(self.target_host, "target_host")?,
            target_port: required(self.target_port, "target_port")?,
            settings,
            log_level: self.log_level.unwrap_or_else(defaults::log_level),
        })
    }
}

/// Tuning knobs shared by the listener loop and every connection bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Upper bound on a single accept or readiness wait
    pub poll_interval: Duration,
    /// Bytes read per forwarding step
    pub buffer_size: usize,
    /// Upper bound on dialing the target
    pub connect_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval: defaults::poll_interval(),
            buffer_size: defaults::buffer_size(),
            connect_timeout: defaults::connect_timeout(),
        }
    }
}

/// Complete bridge configuration
///
/// Immutable once the bridge is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Host to listen on
    pub listen_host: String,
    /// Port to listen on
    pub listen_port: u16,
    /// Target host
    pub target_host: String,
    /// Target port
    pub target_port: u16,
    /// Tuning settings
    pub settings: BridgeSettings,
    /// Log level
    pub log_level: String,
}

impl BridgeConfig {
    /// Create a configuration with default tuning settings
    pub fn new(
        listen_host: impl Into<String>,
        listen_port: u16,
        target_host: impl Into<String>,
        target_port: u16,
    ) -> Self {
        Self {
            listen_host: listen_host.into(),
            listen_port,
            target_host: target_host.into(),
            target_port,
            settings: BridgeSettings::default(),
            log_level: defaults::log_level(),
        }
    }

    /// Replace the tuning settings
    pub fn with_settings(mut self, settings: BridgeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve the listen endpoint
    pub fn listen_addr(&self) -> common::Result<SocketAddr> {
        common::resolve_addr(&self.listen_host, self.listen_port)
    }

    /// Target endpoint as `host:port`, for logging
    pub fn target_label(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }
}
