//! Connection bridge
//!
//! Relays bytes between one accepted client socket and a freshly dialed
//! upstream socket until either side closes, a write fails, or shutdown is
//! requested.

use bytes::BytesMut;
use log::{debug, error, info};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::peer_label;
use crate::config::BridgeSettings;

/// Why a bridged connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// One of the peers closed its side cleanly (zero-byte read)
    PeerClosed,
    /// Forwarding to the other socket failed
    SendFailure(String),
    /// Reading from a socket failed with something other than EOF
    ReceiveFailure(String),
    /// The upstream target could not be reached; nothing was relayed
    DialFailure(String),
    /// Shutdown was requested before either side closed
    Interrupted,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "receiving"),
            CloseReason::SendFailure(err) => write!(f, "sending ({})", err),
            CloseReason::ReceiveFailure(err) => write!(f, "receiving ({})", err),
            CloseReason::DialFailure(err) => write!(f, "connecting ({})", err),
            CloseReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Outcome of a finished connection bridge
#[derive(Debug, Clone)]
pub struct ConnectionSummary {
    /// Worker identifier assigned by the listener loop
    pub id: u64,
    /// Client address
    pub peer: SocketAddr,
    /// Why the bridge stopped
    pub reason: CloseReason,
    /// Bytes forwarded client -> upstream
    pub bytes_upstream: u64,
    /// Bytes forwarded upstream -> client
    pub bytes_downstream: u64,
}

/// One client connection paired with its upstream connection
///
/// Owns the client socket exclusively. Consumed by [`ConnectionBridge::run`];
/// both sockets are closed by the time `run` returns.
pub struct ConnectionBridge {
    id: u64,
    client: TcpStream,
    peer: SocketAddr,
    target_host: String,
    target_port: u16,
    settings: BridgeSettings,
    shutdown: CancellationToken,
}

impl ConnectionBridge {
    /// Create a bridge for an accepted client socket
    ///
    /// # Parameters
    ///
    /// * `id` - Worker identifier used in log lines
    /// * `client` - Accepted client socket
    /// * `peer` - Client address
    /// * `target` - Upstream host and port, dialed when the bridge runs
    /// * `settings` - Poll interval, chunk size and dial timeout
    /// * `shutdown` - Token polled between readiness waits
    pub fn new(
        id: u64,
        client: TcpStream,
        peer: SocketAddr,
        target: (String, u16),
        settings: BridgeSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let (target_host, target_port) = target;
        Self {
            id,
            client,
            peer,
            target_host,
            target_port,
            settings,
            shutdown,
        }
    }

    /// Run the bridge to completion
    ///
    /// Never fails: every way a connection can end is reported through
    /// [`ConnectionSummary::reason`].
    pub async fn run(self) -> ConnectionSummary {
        let Self {
            id,
            mut client,
            peer,
            target_host,
            target_port,
            settings,
            shutdown,
        } = self;

        let tag = format!("[{:0>20}:{}]", id, peer_label(&peer));
        info!("{} New connection", tag);

        let mut counters = Counters::default();

        let reason = match dial(&target_host, target_port, settings.connect_timeout).await {
            Ok(mut upstream) => {
                debug!("{} Connected to {}:{}", tag, target_host, target_port);
                let reason = relay(&mut client, &mut upstream, &settings, &shutdown, &mut counters).await;
                drop(upstream);
                reason
            }
            Err(e) => {
                error!("{} Failed to connect to {}:{}: {}", tag, target_host, target_port, e);
                CloseReason::DialFailure(e.to_string())
            }
        };

        drop(client);

        debug!(
            "{} Forwarded {} bytes upstream, {} bytes downstream",
            tag, counters.upstream, counters.downstream
        );
        info!("{} Connection closed - {}", tag, reason);

        ConnectionSummary {
            id,
            peer,
            reason,
            bytes_upstream: counters.upstream,
            bytes_downstream: counters.downstream,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    upstream: u64,
    downstream: u64,
}

/// Dial the upstream target with a timeout
async fn dial(host: &str, port: u16, connect_timeout: Duration) -> io::Result<TcpStream> {
    match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "Connection timed out")),
    }
}

/// Shuttle bytes in both directions until a close reason is reached
async fn relay(
    client: &mut TcpStream,
    upstream: &mut TcpStream,
    settings: &BridgeSettings,
    shutdown: &CancellationToken,
    counters: &mut Counters,
) -> CloseReason {
    let mut buffer = BytesMut::zeroed(settings.buffer_size);

    loop {
        if shutdown.is_cancelled() {
            return CloseReason::Interrupted;
        }

        let ready = timeout(settings.poll_interval, async {
            tokio::select! {
                r = client.readable() => r,
                r = upstream.readable() => r,
            }
        })
        .await;

        match ready {
            // Nothing readable this cycle
            Err(_) => continue,
            Ok(Err(e)) => return CloseReason::ReceiveFailure(e.to_string()),
            Ok(Ok(())) => {}
        }

        // Drain both sides in the same cycle so a busy direction cannot starve the other
        if let Some(reason) = forward(client, upstream, &mut buffer, &mut counters.upstream).await {
            return reason;
        }
        if let Some(reason) = forward(upstream, client, &mut buffer, &mut counters.downstream).await {
            return reason;
        }
    }
}

/// Move at most one chunk from `src` to `dst`
///
/// Returns `None` when the bridge should keep going, including when `src`
/// had nothing to read.
async fn forward(
    src: &TcpStream,
    dst: &mut TcpStream,
    buffer: &mut BytesMut,
    total: &mut u64,
) -> Option<CloseReason> {
    let n = match src.try_read(&mut buffer[..]) {
        Ok(0) => return Some(CloseReason::PeerClosed),
        Ok(n) => n,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            return None;
        }
        Err(e) => return Some(CloseReason::ReceiveFailure(e.to_string())),
    };

    if let Err(e) = dst.write_all(&buffer[..n]).await {
        return Some(CloseReason::SendFailure(e.to_string()));
    }

    *total += n as u64;
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn settings() -> BridgeSettings {
        BridgeSettings {
            poll_interval: Duration::from_millis(100),
            ..BridgeSettings::default()
        }
    }

    /// Returns (external client end, accepted end, client address)
    async fn socket_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (accepted, peer) = accepted.unwrap();
        (client.unwrap(), accepted, peer)
    }

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::PeerClosed.to_string(), "receiving");
        assert_eq!(CloseReason::Interrupted.to_string(), "interrupted");
        assert_eq!(
            CloseReason::SendFailure("Broken pipe".to_string()).to_string(),
            "sending (Broken pipe)"
        );
        assert_eq!(
            CloseReason::DialFailure("Connection refused".to_string()).to_string(),
            "connecting (Connection refused)"
        );
    }

    #[tokio::test]
    async fn test_peer_closed_closes_upstream() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_port = target.local_addr().unwrap().port();
        let (mut client, accepted, peer) = socket_pair().await;

        let bridge = ConnectionBridge::new(
            1,
            accepted,
            peer,
            ("127.0.0.1".to_string(), target_port),
            settings(),
            CancellationToken::new(),
        );
        let task = tokio::spawn(bridge.run());

        let (mut upstream, _) = target.accept().await.unwrap();

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(client);

        let summary = task.await.unwrap();
        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.bytes_upstream, 5);
        assert_eq!(summary.bytes_downstream, 0);

        // Upstream side sees EOF promptly
        let mut rest = Vec::new();
        let n = timeout(Duration::from_secs(1), upstream.read_to_end(&mut rest))
            .await
            .expect("upstream should be closed within a second")
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_interrupted() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_port = target.local_addr().unwrap().port();
        let (mut client, accepted, peer) = socket_pair().await;
        let shutdown = CancellationToken::new();

        let bridge = ConnectionBridge::new(
            2,
            accepted,
            peer,
            ("127.0.0.1".to_string(), target_port),
            settings(),
            shutdown.clone(),
        );
        let task = tokio::spawn(bridge.run());
        let (_upstream, _) = target.accept().await.unwrap();

        shutdown.cancel();

        let summary = timeout(Duration::from_secs(2), task)
            .await
            .expect("bridge should notice the interruption")
            .unwrap();
        assert_eq!(summary.reason, CloseReason::Interrupted);

        // Client socket was released
        let mut buf = [0u8; 1];
        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_dial_failure_releases_client() {
        let port = unused_port().await;
        let (mut client, accepted, peer) = socket_pair().await;

        let bridge = ConnectionBridge::new(
            3,
            accepted,
            peer,
            ("127.0.0.1".to_string(), port),
            settings(),
            CancellationToken::new(),
        );
        let summary = bridge.run().await;

        assert!(matches!(summary.reason, CloseReason::DialFailure(_)));

        let mut buf = [0u8; 1];
        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_zero_byte_client_is_peer_closed() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_port = target.local_addr().unwrap().port();
        let (client, accepted, peer) = socket_pair().await;

        let bridge = ConnectionBridge::new(
            4,
            accepted,
            peer,
            ("127.0.0.1".to_string(), target_port),
            settings(),
            CancellationToken::new(),
        );
        let task = tokio::spawn(bridge.run());
        drop(client);

        let (mut upstream, _) = target.accept().await.unwrap();

        let summary = timeout(Duration::from_secs(2), task)
            .await
            .expect("bridge should close after the client leaves")
            .unwrap();
        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.bytes_upstream, 0);
        assert_eq!(summary.bytes_downstream, 0);

        let mut rest = Vec::new();
        assert_eq!(upstream.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upstream_reset_during_write_is_send_failure() {
        let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_port = target.local_addr().unwrap().port();
        let (mut client, accepted, peer) = socket_pair().await;

        let bridge = ConnectionBridge::new(
            5,
            accepted,
            peer,
            ("127.0.0.1".to_string(), target_port),
            settings(),
            CancellationToken::new(),
        );
        let task = tokio::spawn(bridge.run());

        // The target never reads, so the bridge ends up blocked writing upstream
        let (upstream, _) = target.accept().await.unwrap();
        let writer = tokio::spawn(async move {
            let payload = vec![0x5au8; 32 * 1024 * 1024];
            let _ = client.write_all(&payload).await;
        });

        tokio::time::sleep(Duration::from_millis(500)).await;

        // Closing with unread data resets the connection
        drop(upstream);

        let summary = timeout(Duration::from_secs(5), task)
            .await
            .expect("bridge should stop once the upstream write fails")
            .unwrap();
        assert!(
            matches!(summary.reason, CloseReason::SendFailure(_)),
            "unexpected reason: {}",
            summary.reason
        );
        assert!(summary.bytes_upstream > 0);

        // Client side is released, so the writer gives up
        timeout(Duration::from_secs(5), writer).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_forward_send_failure() {
        let (mut writer, src, _) = socket_pair().await;
        let (_far_end, mut dst, _) = socket_pair().await;

        // Our own write half is closed, so any forward must fail
        dst.shutdown().await.unwrap();

        writer.write_all(b"data").await.unwrap();
        src.readable().await.unwrap();

        let mut buffer = BytesMut::zeroed(16);
        let mut total = 0;
        let reason = forward(&src, &mut dst, &mut buffer, &mut total).await;

        assert!(matches!(reason, Some(CloseReason::SendFailure(_))));
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_forward_not_ready() {
        let (_writer, src, _) = socket_pair().await;
        let (_far_end, mut dst, _) = socket_pair().await;

        let mut buffer = BytesMut::zeroed(16);
        let mut total = 0;
        assert!(forward(&src, &mut dst, &mut buffer, &mut total).await.is_none());
    }

    #[tokio::test]
    async fn test_forward_respects_chunk_size() {
        let (mut writer, src, _) = socket_pair().await;
        let (mut far_end, mut dst, _) = socket_pair().await;

        writer.write_all(&[7u8; 10]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        src.readable().await.unwrap();

        let mut buffer = BytesMut::zeroed(4);
        let mut total = 0;
        assert!(forward(&src, &mut dst, &mut buffer, &mut total).await.is_none());
        assert_eq!(total, 4);

        let mut buf = [0u8; 4];
        far_end.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [7u8; 4]);
    }
}
