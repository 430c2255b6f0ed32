//! Bridge module
//!
//! The listener loop accepts client connections and hands each one to its
//! own connection bridge task. Both poll a shared cancellation token between
//! bounded waits, so shutdown is noticed within one poll interval even when
//! no traffic is flowing.

mod connection;
mod listener;

pub use connection::{CloseReason, ConnectionBridge, ConnectionSummary};
pub use listener::Bridge;
