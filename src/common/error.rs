//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// TCP bridge error type
///
/// Only listener-level failures are represented here. Anything that goes
/// wrong inside a single bridged connection ends that connection with a
/// [`CloseReason`](crate::bridge::CloseReason) instead.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The listening socket could not be created, bound or put into listen mode
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// Non-timeout failure of the accept call
    #[error("Accept error: {0}")]
    Accept(#[source] io::Error),

    /// Host name could not be resolved to a socket address
    #[error("Address resolution error: {0}")]
    Resolve(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// `start` was called on a bridge whose listener loop already ran
    #[error("Bridge already started")]
    AlreadyStarted,

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err: BridgeError = io_err.into();

        match err {
            BridgeError::Io(_) => {}
            _ => panic!("Should convert to IO error"),
        }
    }

    #[test]
    fn test_bind_error_display() {
        let err = BridgeError::Bind {
            addr: "127.0.0.1:9000".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        let err_str = err.to_string();
        assert!(err_str.contains("127.0.0.1:9000"));
        assert!(err_str.contains("address in use"));
    }
}
