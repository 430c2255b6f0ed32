//! Network utility functions
//!
//! This module provides utility functions for network operations.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use super::error::{BridgeError, Result};

/// Resolve a host/port pair to the first matching socket address
///
/// Literal IP addresses are used as-is; anything else goes through the
/// system resolver.
///
/// # Arguments
///
/// * `host` - Host name or IP address
/// * `port` - Port number
///
/// # Returns
///
/// The resolved `SocketAddr`
pub fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    // Try direct parsing first
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next().ok_or_else(|| {
            BridgeError::Resolve(format!("No address found for {}:{}", host, port))
        }),
        Err(e) => Err(BridgeError::Resolve(format!(
            "Failed to resolve {}:{}: {}",
            host, port, e
        ))),
    }
}

/// Format a peer address the way connection log lines expect it: `ip:port`
pub fn peer_label(addr: &SocketAddr) -> String {
    format!("{}:{}", addr.ip(), addr.port())
}
