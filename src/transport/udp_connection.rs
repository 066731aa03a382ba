//! UDP Transport Implementation
//!
//! Provides the tokio UDP implementation of the [`Transport`] and
//! [`Endpoint`] traits. Every datagram is fire-and-forget; bounded receives
//! report [`Received::TimedOut`] instead of failing.
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};

use super::common::{FrozenTransportStats, TransportStats};
use super::traits::{Endpoint, Received, Transport};
use crate::error::{Result, SwimError};
use crate::transport_error;

/// Receive buffer size. Protocol messages are capped well below this; longer
/// datagrams are truncated to it.
pub const RECV_BUFFER_SIZE: usize = 8192;

#[derive(Clone, Debug, Default)]
pub struct UdpTransport {
    stats: Arc<TransportStats>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn bind(&self, addr: SocketAddr) -> Result<Arc<dyn Endpoint>> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| transport_error!("Socket bind to {} failed: {}", addr, e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| transport_error!("Socket creation failed: {}", e))?;

        self.stats.endpoints_bound.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(UdpEndpoint {
            socket,
            local_addr,
            stats: Arc::clone(&self.stats),
        }))
    }

    async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| transport_error!("Cannot resolve {}:{}: {}", host, port, e))?;
        addrs
            .next()
            .ok_or_else(|| transport_error!("No address found for {}:{}", host, port))
    }

    fn stats(&self) -> FrozenTransportStats {
        self.stats.freeze()
    }
}

/// One bound UDP socket
#[derive(Debug)]
pub struct UdpEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: Arc<TransportStats>,
}

impl UdpEndpoint {
    async fn recv_once(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

#[async_trait]
impl Endpoint for UdpEndpoint {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        match self.socket.send_to(data, target).await {
            Ok(_write_size) => {
                self.stats.datagrams_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                error!("[{}] Failed to send UDP data to {}: {}", self.local_addr, target, e);
                Err(SwimError::Io(e))
            }
        }
    }

    async fn recv(&self, wait: Option<Duration>) -> Result<Received> {
        let deadline = wait.map(|wait| Instant::now() + wait);
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let outcome = match deadline {
                Some(deadline) => match timeout_at(deadline, self.recv_once(&mut buf)).await {
                    Ok(outcome) => outcome,
                    Err(_elapsed) => return Ok(Received::TimedOut),
                },
                None => self.recv_once(&mut buf).await,
            };

            match outcome {
                Ok((len, from)) => {
                    self.stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
                    buf.truncate(len);
                    return Ok(Received::Datagram { data: buf, from });
                }
                // ICMP unreachable from an earlier send surfaces here on some platforms
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                    ) =>
                {
                    self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("[{}] Ignoring UDP receive error: {}", self.local_addr, e);
                }
                Err(e) => {
                    self.stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                    return Err(SwimError::Io(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let transport = UdpTransport::new();
        let receiver = transport.bind(loopback()).await.unwrap();
        let sender = transport.bind(loopback()).await.unwrap();

        assert!(receiver.local_addr().port() > 0);

        sender
            .send_to(b"test message", receiver.local_addr())
            .await
            .unwrap();

        match receiver.recv(Some(Duration::from_millis(500))).await.unwrap() {
            Received::Datagram { data, from } => {
                assert_eq!(data, b"test message");
                assert_eq!(from, sender.local_addr());
            }
            Received::TimedOut => panic!("Timeout waiting for message"),
        }

        let stats = transport.stats();
        assert_eq!(stats.endpoints_bound, 2);
        assert_eq!(stats.datagrams_sent, 1);
        assert_eq!(stats.datagrams_received, 1);
    }

    #[tokio::test]
    async fn test_receive_timeout_is_a_value() {
        let transport = UdpTransport::new();
        let endpoint = transport.bind(loopback()).await.unwrap();

        let started = Instant::now();
        let received = endpoint.recv(Some(Duration::from_millis(50))).await.unwrap();

        assert_eq!(received, Received::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_oversized_datagram_truncated_to_buffer() {
        let transport = UdpTransport::new();
        let receiver = transport.bind(loopback()).await.unwrap();
        let sender = transport.bind(loopback()).await.unwrap();

        let oversized = vec![7u8; RECV_BUFFER_SIZE * 2];
        sender
            .send_to(&oversized, receiver.local_addr())
            .await
            .unwrap();
        sender.send_to(b"small", receiver.local_addr()).await.unwrap();

        match receiver.recv(Some(Duration::from_millis(500))).await.unwrap() {
            Received::Datagram { data, .. } => assert_eq!(data.len(), RECV_BUFFER_SIZE),
            Received::TimedOut => panic!("Timeout waiting for oversized message"),
        }
        match receiver.recv(Some(Duration::from_millis(500))).await.unwrap() {
            Received::Datagram { data, .. } => assert_eq!(data, b"small"),
            Received::TimedOut => panic!("Timeout waiting for message"),
        }
    }

    #[tokio::test]
    async fn test_bind_conflict_is_transport_error() {
        let transport = UdpTransport::new();
        let first = transport.bind(loopback()).await.unwrap();

        let result = transport.bind(first.local_addr()).await;
        assert!(matches!(result, Err(SwimError::Transport(_))));
    }

    #[tokio::test]
    async fn test_resolve_literal_address() {
        let transport = UdpTransport::new();
        let addr = transport.resolve("127.0.0.1", 4242).await.unwrap();
        assert_eq!(addr, "127.0.0.1:4242".parse().unwrap());
    }
}
