//! Default configuration values
//!
//! Single source of truth for the tuning defaults. The four endpoint values
//! (listen/target host and port) deliberately have no defaults.

use std::time::Duration;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TCP_BRIDGE_";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Interval at which accept and readiness waits give up to re-check for interruption
pub const POLL_INTERVAL_MS: u64 = 500;

/// Bytes read from a socket per forwarding step
pub const BUFFER_SIZE: usize = 1024;

/// Largest accepted read chunk (1 MiB)
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Upstream dial timeout in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Listen backlog passed to `listen(2)`
pub const LISTEN_BACKLOG: i32 = 1024;

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default poll interval
pub fn poll_interval() -> Duration {
    Duration::from_millis(POLL_INTERVAL_MS)
}

/// Default buffer size (1KB)
pub fn buffer_size() -> usize {
    BUFFER_SIZE
}

/// Default upstream connect timeout
pub fn connect_timeout() -> Duration {
    Duration::from_secs(CONNECT_TIMEOUT_SECS)
}
