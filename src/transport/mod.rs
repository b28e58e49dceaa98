//! Generic UDP transport
//!
//! A single bound UDP socket used for fire-and-forget datagram sends plus a
//! channel-based receive loop. The consensus engine never blocks on this
//! layer: sends happen after engine state has been released, and a failed
//! send is logged and absorbed because flood re-propagation compensates for
//! lost individual messages.

pub mod receiver;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{event, Level};

use crate::error::{KvoraError, Result};
use crate::transport_error;
pub use receiver::{ReceiverStats, UdpReceiver};

/// Seam between the dissemination layer and a concrete transport, so test
/// harness bindings can swap the socket for an in-process channel.
#[async_trait]
pub trait PeerSender: Send + Sync {
    async fn send(&self, target: SocketAddr, data: &[u8]) -> Result<()>;
}

/// Send-side statistics
#[derive(Debug, Default)]
pub struct SendStats {
    pub datagrams_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

#[derive(Clone, Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    stats: Arc<SendStats>,
}

impl UdpTransport {
    /// Bind the node's datagram socket.
    pub async fn bind(bind_addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| transport_error!("Socket creation failed: {}", e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| transport_error!("Socket creation failed: {}", e))?;

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            stats: Arc::new(SendStats::default()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receiver over the same socket.
    pub fn receiver(&self) -> UdpReceiver {
        UdpReceiver::new(Arc::clone(&self.socket))
    }

    pub fn datagrams_sent(&self) -> u64 {
        self.stats.datagrams_sent.load(Ordering::Relaxed)
    }

    pub fn send_errors(&self) -> u64 {
        self.stats.send_errors.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PeerSender for UdpTransport {
    async fn send(&self, target: SocketAddr, data: &[u8]) -> Result<()> {
        match self.socket.send_to(data, target).await {
            Ok(_) => {
                self.stats.datagrams_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                event!(
                    Level::WARN,
                    message = "Datagram send failed",
                    target = %target,
                    err = %e
                );
                Err(KvoraError::Transport(format!(
                    "Send to {} failed: {}",
                    target, e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0)
    }

    #[tokio::test]
    async fn test_bind_assigns_local_addr() {
        let transport = UdpTransport::bind(loopback()).await.unwrap();
        assert!(transport.local_addr().port() > 0);
    }

    #[tokio::test]
    async fn test_send_between_transports() {
        let a = UdpTransport::bind(loopback()).await.unwrap();
        let b = UdpTransport::bind(loopback()).await.unwrap();
        let mut rx = b.receiver().into_message_channel();

        a.send(b.local_addr(), b"hello").await.unwrap();

        let (data, from) = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(data, b"hello");
        assert_eq!(from, a.local_addr());
        assert_eq!(a.datagrams_sent(), 1);
        assert_eq!(a.send_errors(), 0);
    }
}
