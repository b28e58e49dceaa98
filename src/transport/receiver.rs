//! UDP receive loop
//!
//! Feeds raw datagrams into an unbounded channel for the node layer to
//! decode and apply. Receive errors are counted and the loop continues;
//! the consensus layer tolerates any individual loss.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Statistics for the receiver
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub datagrams_received: AtomicU64,
    pub receive_errors: AtomicU64,
}

pub struct UdpReceiver {
    socket: Arc<UdpSocket>,
    stats: Arc<ReceiverStats>,
}

impl UdpReceiver {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self {
            socket,
            stats: Arc::new(ReceiverStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the receive loop and return the message channel.
    ///
    /// The loop exits once the channel receiver is dropped.
    pub fn into_message_channel(self) -> mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = self.socket;
        let stats = self.stats;

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65536]; // 64KB buffer

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => {
                        stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
                        if tx.send((buf[..len].to_vec(), addr)).is_err() {
                            // Receiver dropped, exit the task
                            break;
                        }
                    }
                    Err(e) => {
                        stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("UDP receive error: {}", e);
                        // Continue receiving despite errors
                    }
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_channel_receiving() {
        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0);
        let socket = Arc::new(UdpSocket::bind(bind_addr).await.unwrap());
        let receiver_addr = socket.local_addr().unwrap();

        let receiver = UdpReceiver::new(socket);
        let stats = receiver.stats();
        let mut message_rx = receiver.into_message_channel();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender_addr = sender.local_addr().unwrap();
        sender.send_to(b"test message", receiver_addr).await.unwrap();

        match timeout(Duration::from_millis(200), message_rx.recv()).await {
            Ok(Some((data, addr))) => {
                assert_eq!(data, b"test message");
                assert_eq!(addr, sender_addr);
            }
            Ok(None) => panic!("Channel closed unexpectedly"),
            Err(_) => panic!("Timeout waiting for message"),
        }

        assert_eq!(stats.datagrams_received.load(Ordering::Relaxed), 1);
    }
}
