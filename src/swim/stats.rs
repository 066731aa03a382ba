//! Detector statistics
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Protocol counters shared by every detector task
#[derive(Debug, Default)]
pub struct DetectorStats {
    pub probe_cycles: AtomicU64,
    pub probes_sent: AtomicU64,
    pub acks_received: AtomicU64,
    pub probe_timeouts: AtomicU64,
    pub ping_reqs_sent: AtomicU64,
    pub relays_received: AtomicU64,
    pub helper_probes: AtomicU64,
    pub ping_reqs_dropped: AtomicU64,
    pub relays_sent: AtomicU64,
    pub failures_declared: AtomicU64,
    pub fails_sent: AtomicU64,
    pub fails_received: AtomicU64,
    pub joins_sent: AtomicU64,
    pub joins_received: AtomicU64,
    pub messages_received: AtomicU64,
    pub decode_errors: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrozenDetectorStats {
    pub probe_cycles: u64,
    pub probes_sent: u64,
    pub acks_received: u64,
    pub probe_timeouts: u64,
    pub ping_reqs_sent: u64,
    pub relays_received: u64,
    pub helper_probes: u64,
    pub ping_reqs_dropped: u64,
    pub relays_sent: u64,
    pub failures_declared: u64,
    pub fails_sent: u64,
    pub fails_received: u64,
    pub joins_sent: u64,
    pub joins_received: u64,
    pub messages_received: u64,
    pub decode_errors: u64,
}

impl DetectorStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn freeze(&self) -> FrozenDetectorStats {
        FrozenDetectorStats {
            probe_cycles: self.probe_cycles.load(Ordering::Relaxed),
            probes_sent: self.probes_sent.load(Ordering::Relaxed),
            acks_received: self.acks_received.load(Ordering::Relaxed),
            probe_timeouts: self.probe_timeouts.load(Ordering::Relaxed),
            ping_reqs_sent: self.ping_reqs_sent.load(Ordering::Relaxed),
            relays_received: self.relays_received.load(Ordering::Relaxed),
            helper_probes: self.helper_probes.load(Ordering::Relaxed),
            ping_reqs_dropped: self.ping_reqs_dropped.load(Ordering::Relaxed),
            relays_sent: self.relays_sent.load(Ordering::Relaxed),
            failures_declared: self.failures_declared.load(Ordering::Relaxed),
            fails_sent: self.fails_sent.load(Ordering::Relaxed),
            fails_received: self.fails_received.load(Ordering::Relaxed),
            joins_sent: self.joins_sent.load(Ordering::Relaxed),
            joins_received: self.joins_received.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freeze_and_serialize() {
        let stats = DetectorStats::default();
        DetectorStats::incr(&stats.probes_sent);
        DetectorStats::add(&stats.fails_sent, 2);

        let frozen = stats.freeze();
        assert_eq!(frozen.probes_sent, 1);
        assert_eq!(frozen.fails_sent, 2);

        let json = serde_json::to_value(frozen).unwrap();
        assert_eq!(json["fails_sent"], 2);
        assert_eq!(json["decode_errors"], 0);
    }
}
