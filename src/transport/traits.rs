//! Transport traits for datagram communication
//!
//! The detector only ever talks to the network through these traits, so the
//! UDP implementation can be swapped for a lossy or in-memory one in tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::common::FrozenTransportStats;
use crate::error::Result;

/// Outcome of a bounded receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A datagram arrived before the deadline
    Datagram { data: Vec<u8>, from: SocketAddr },
    /// Nothing arrived before the deadline
    TimedOut,
}

/// A bound datagram socket
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Address this endpoint is bound to
    fn local_addr(&self) -> SocketAddr;

    /// Fire-and-forget send, no delivery guarantee
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Wait for the next datagram; `None` waits indefinitely
    async fn recv(&self, wait: Option<Duration>) -> Result<Received>;
}

/// Factory for endpoints plus name resolution
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind a new endpoint, port 0 picks an ephemeral port
    async fn bind(&self, addr: SocketAddr) -> Result<Arc<dyn Endpoint>>;

    /// Resolve `host` to a socket address on `port`
    async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr>;

    /// Get transport statistics for monitoring
    fn stats(&self) -> FrozenTransportStats;
}
