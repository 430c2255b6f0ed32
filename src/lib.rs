//! TCP Bridge: bidirectional TCP relay
//!
//! Listens on a local address and, for every accepted connection, opens a
//! new connection to a fixed target and copies bytes both ways until either
//! side closes or the bridge is interrupted. The payload is relayed as raw
//! bytes; no protocol is inspected.
//!
//! # Main Features
//!
//! - One task per bridged connection, no connection limit
//! - Cooperative shutdown: accepting stops, active connections drain, then
//!   the listening socket closes
//! - Connection failures stay local to the connection they happened on
//!
//! # Example
//!
//! ```no_run
//! use tcp_bridge::{Bridge, BridgeConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = BridgeConfig::new("127.0.0.1", 9000, "127.0.0.1", 9001);
//!
//!     let mut bridge = Bridge::new(config)?;
//!     let shutdown = bridge.shutdown_token();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.cancel();
//!     });
//!
//!     // Returns once every connection has drained
//!     bridge.start(true).await
//! }
//! ```

// Public modules
pub mod bridge;
pub mod common;
pub mod config;

// Re-export commonly used structures and functions for convenience
pub use bridge::{Bridge, CloseReason, ConnectionBridge, ConnectionSummary};
pub use common::{BridgeError, Result, init_logger, resolve_addr};
pub use config::{BridgeConfig, BridgeSettings};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
