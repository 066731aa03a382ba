//! Shared transport statistics and address helpers
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Statistics shared by every endpoint of one transport
#[derive(Debug, Default)]
pub struct TransportStats {
    pub endpoints_bound: AtomicU64,
    pub datagrams_sent: AtomicU64,
    pub datagrams_received: AtomicU64,
    pub send_errors: AtomicU64,
    pub receive_errors: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrozenTransportStats {
    pub endpoints_bound: u64,
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
}

impl TransportStats {
    pub fn freeze(&self) -> FrozenTransportStats {
        FrozenTransportStats {
            endpoints_bound: self.endpoints_bound.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

/// Wildcard address with an ephemeral port, same family as `peer`
pub fn ephemeral_for(peer: &SocketAddr) -> SocketAddr {
    let ip = if peer.is_ipv4() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    };
    SocketAddr::new(ip, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_matches_family() {
        let v4: SocketAddr = "10.1.2.3:9000".parse().unwrap();
        let v6: SocketAddr = "[::1]:9000".parse().unwrap();

        assert_eq!(ephemeral_for(&v4), "0.0.0.0:0".parse().unwrap());
        assert_eq!(ephemeral_for(&v6), "[::]:0".parse().unwrap());
    }

    #[test]
    fn test_freeze_copies_counters() {
        let stats = TransportStats::default();
        stats.datagrams_sent.fetch_add(3, Ordering::Relaxed);
        stats.receive_errors.fetch_add(1, Ordering::Relaxed);

        let frozen = stats.freeze();
        assert_eq!(frozen.datagrams_sent, 3);
        assert_eq!(frozen.receive_errors, 1);
        assert_eq!(frozen.datagrams_received, 0);
    }
}
