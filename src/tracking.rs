// tracking.rs - optional in-memory delivery-tracking observer.
//
// Mirrors the sent/received bookkeeping and packet-delivery-ratio
// computation the protocol originally derived from on-disk JSON files.
// Persistence is out of scope here; only the PDR computation survives, as
// an observer the facade can optionally feed rather than a baked-in part of
// the core send/receive path.
use std::collections::HashSet;
use std::sync::Mutex;

use crate::delivery::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PacketKey {
    channel: Channel,
    seq_no: u16,
}

/// Snapshot of delivery statistics at the moment `snapshot()` was called.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    pub total_sent: u64,
    pub total_received: u64,
    pub reliable_sent: u64,
    pub reliable_received: u64,
    pub unreliable_sent: u64,
    pub unreliable_received: u64,
    pub overall_delivery_ratio: f64,
    pub reliable_delivery_ratio: f64,
    pub unreliable_delivery_ratio: f64,
    /// Sequences recorded as sent but never recorded as received, most
    /// recently seen first is not guaranteed — this is an unordered list.
    pub lost_packets: Vec<(Channel, u16)>,
}

/// Accumulates sent/received events in memory and computes packet delivery
/// ratios on demand. Constructed and owned by the facade; not a global.
#[derive(Default)]
pub struct DeliveryTracker {
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    sent: HashSet<PacketKey>,
    received: HashSet<PacketKey>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, channel: Channel, seq_no: u16) {
        let mut state = self.state.lock().unwrap();
        state.sent.insert(PacketKey { channel, seq_no });
    }

    pub fn record_received(&self, channel: Channel, seq_no: u16) {
        let mut state = self.state.lock().unwrap();
        state.received.insert(PacketKey { channel, seq_no });
    }

    pub fn snapshot(&self) -> DeliveryStats {
        let state = self.state.lock().unwrap();

        let mut stats = DeliveryStats::default();
        for key in &state.sent {
            stats.total_sent += 1;
            match key.channel {
                Channel::Reliable => stats.reliable_sent += 1,
                Channel::Unreliable => stats.unreliable_sent += 1,
            }
        }
        for key in &state.received {
            stats.total_received += 1;
            match key.channel {
                Channel::Reliable => stats.reliable_received += 1,
                Channel::Unreliable => stats.unreliable_received += 1,
            }
        }

        stats.overall_delivery_ratio = ratio(stats.total_received, stats.total_sent);
        stats.reliable_delivery_ratio = ratio(stats.reliable_received, stats.reliable_sent);
        stats.unreliable_delivery_ratio = ratio(stats.unreliable_received, stats.unreliable_sent);

        stats.lost_packets = state
            .sent
            .iter()
            .filter(|key| !state.received.contains(*key))
            .map(|key| (key.channel, key.seq_no))
            .collect();

        stats
    }
}

fn ratio(numer: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        (numer as f64 / denom as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_reports_zero_ratios() {
        let tracker = DeliveryTracker::new();
        let stats = tracker.snapshot();
        assert_eq!(stats.total_sent, 0);
        assert_eq!(stats.overall_delivery_ratio, 0.0);
    }

    #[test]
    fn computes_per_channel_ratios_and_lost_list() {
        let tracker = DeliveryTracker::new();
        tracker.record_sent(Channel::Reliable, 0);
        tracker.record_sent(Channel::Reliable, 1);
        tracker.record_sent(Channel::Unreliable, 0);
        tracker.record_received(Channel::Reliable, 0);

        let stats = tracker.snapshot();
        assert_eq!(stats.total_sent, 3);
        assert_eq!(stats.total_received, 1);
        assert_eq!(stats.reliable_delivery_ratio, 50.0);
        assert_eq!(stats.unreliable_delivery_ratio, 0.0);
        assert_eq!(stats.lost_packets.len(), 2);
        assert!(stats
            .lost_packets
            .contains(&(Channel::Reliable, 1)));
        assert!(stats
            .lost_packets
            .contains(&(Channel::Unreliable, 0)));
    }
}
