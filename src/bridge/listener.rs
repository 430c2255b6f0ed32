//! Listener loop
//!
//! Accepts client connections and spawns one [`ConnectionBridge`] per
//! connection. Shutdown is ordered: stop accepting, wait for every bridge to
//! finish, then close the listening socket.

use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::{BridgeError, Result};
use crate::config::{BridgeConfig, LISTEN_BACKLOG};
use super::connection::{CloseReason, ConnectionBridge, ConnectionSummary};

/// TCP bridge
///
/// Listens on the configured address and relays every accepted connection
/// to the configured target.
///
/// # Example
///
/// ```no_run
/// use tcp_bridge::{Bridge, BridgeConfig};
///
/// # async fn run() -> tcp_bridge::Result<()> {
/// let mut bridge = Bridge::new(BridgeConfig::new("127.0.0.1", 9000, "127.0.0.1", 9001))?;
/// bridge.start(false).await?;
/// // ... later
/// bridge.interrupt().await?;
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    config: Arc<BridgeConfig>,
    local_addr: SocketAddr,
    /// Present until the listener loop takes it over
    listener: Option<TcpListener>,
    shutdown: CancellationToken,
    accept_loop: Option<JoinHandle<Result<()>>>,
}

impl Bridge {
    /// Bind the listening socket
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Bind`] if the address is in use, not
    /// permitted or invalid, and [`BridgeError::Resolve`] if the listen host
    /// cannot be resolved.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let addr = config.listen_addr()?;
        let listener = bind_listener(addr).map_err(|source| BridgeError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        info!("Bridge listening on {}, forwarding to {}", local_addr, config.target_label());

        Ok(Self {
            config: Arc::new(config),
            local_addr,
            listener: Some(listener),
            shutdown: CancellationToken::new(),
            accept_loop: None,
        })
    }

    /// Address the listening socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Configuration the bridge was built with
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Token that requests shutdown when cancelled
    ///
    /// Lets a signal handler stop a bridge whose `start(true)` is still
    /// running. Cancelling it does not wait for the drain.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start accepting connections
    ///
    /// With `blocking` set this only returns once the listener loop has shut
    /// down, with the loop's result. Otherwise it returns immediately and the
    /// loop is awaited by [`Bridge::interrupt`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyStarted`] on a second call, and
    /// [`BridgeError::Accept`] (blocking mode only) if accepting failed.
    pub async fn start(&mut self, blocking: bool) -> Result<()> {
        let listener = self.listener.take().ok_or(BridgeError::AlreadyStarted)?;

        let accept_loop = AcceptLoop {
            listener,
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
        };
        let handle = tokio::spawn(accept_loop.run());

        if blocking {
            join_accept_loop(handle).await
        } else {
            self.accept_loop = Some(handle);
            Ok(())
        }
    }

    /// Request shutdown and wait until every connection has drained
    ///
    /// Does nothing if the bridge was never started. Returns the listener
    /// loop's result, so a fatal accept error in non-blocking mode surfaces
    /// here.
    pub async fn interrupt(&mut self) -> Result<()> {
        if self.listener.is_some() {
            debug!("Interrupt requested before start, nothing to stop");
            return Ok(());
        }

        self.shutdown.cancel();

        match self.accept_loop.take() {
            Some(handle) => join_accept_loop(handle).await,
            None => Ok(()),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Once the loop owns the listener it may be detached, e.g. when a
        // blocking `start` future was dropped, and would keep accepting forever
        if self.listener.is_none() {
            self.shutdown.cancel();
        }
    }
}

/// Create the listening socket with address reuse enabled
fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

async fn join_accept_loop(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle
        .await
        .map_err(|e| BridgeError::Other(format!("Listener loop task failed: {}", e)))?
}

/// State owned by the running listener loop
struct AcceptLoop {
    listener: TcpListener,
    config: Arc<BridgeConfig>,
    shutdown: CancellationToken,
}

impl AcceptLoop {
    async fn run(self) -> Result<()> {
        let Self { listener, config, shutdown } = self;
        let settings = config.settings;

        let mut workers: JoinSet<ConnectionSummary> = JoinSet::new();
        let mut next_id: u64 = 0;

        let result = loop {
            if shutdown.is_cancelled() {
                info!("Interrupt received, no longer accepting connections");
                break Ok(());
            }

            // Reap bridges that already finished
            while let Some(joined) = workers.try_join_next() {
                log_worker_exit(joined);
            }

            match timeout(settings.poll_interval, listener.accept()).await {
                // No connection this cycle, re-check the token
                Err(_) => continue,
                Ok(Ok((client, peer))) => {
                    next_id += 1;
                    let bridge = ConnectionBridge::new(
                        next_id,
                        client,
                        peer,
                        (config.target_host.clone(), config.target_port),
                        settings,
                        shutdown.clone(),
                    );
                    workers.spawn(bridge.run());
                }
                Ok(Err(e)) => {
                    error!("Error accepting connection: {}", e);
                    // Active bridges must drain before the listener can close
                    shutdown.cancel();
                    break Err(BridgeError::Accept(e));
                }
            }
        };

        if !workers.is_empty() {
            info!("Waiting for {} active connection(s) to close...", workers.len());
        }
        while let Some(joined) = workers.join_next().await {
            log_worker_exit(joined);
        }

        let addr = listener.local_addr().ok();
        drop(listener);

        match addr {
            Some(addr) => info!("Listener on {} closed", addr),
            None => info!("Listener closed"),
        }

        result
    }
}

fn log_worker_exit(joined: std::result::Result<ConnectionSummary, tokio::task::JoinError>) {
    match joined {
        Ok(summary) => {
            if let CloseReason::DialFailure(_) = summary.reason {
                warn!("Connection {} from {} never reached the target", summary.id, summary.peer);
            }
        }
        Err(e) => error!("Connection task error: {}", e),
    }
}
