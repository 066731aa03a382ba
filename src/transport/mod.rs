//! Datagram Transport Module
//!
//! Thin adapter over UDP sockets. Long-lived endpoints back the well-known
//! listeners; one-shot endpoints back individual probes and are dropped as
//! soon as the probe returns.

pub mod common;
pub mod traits;
pub mod udp_connection;

pub use common::{ephemeral_for, FrozenTransportStats, TransportStats};
pub use traits::{Endpoint, Received, Transport};
pub use udp_connection::{UdpEndpoint, UdpTransport};
