// stats.rs - statistics types shared by the socket, the reliable channel,
// and the delivery-tracking observer.
use std::time::Instant;

/// Per-socket send/receive counters.
#[derive(Debug, Clone, Default)]
pub struct SocketStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub last_receive_time: Option<Instant>,
    pub last_send_time: Option<Instant>,
}

/// Reliable-channel counters, observability only — never fed back into the
/// retransmission timer (no congestion control, per the non-goals).
#[derive(Debug, Clone)]
pub struct ReliabilityStats {
    pub packets_in_flight: usize,
    pub send_base: u16,
    pub next_seq: u16,
    pub total_sent: u64,
    pub total_acked: u64,
    pub total_retransmitted: u64,
    pub total_skipped: u64,
    /// Smoothed RTT in milliseconds, updated on each ACK. `None` until the
    /// first ACK arrives.
    pub srtt_ms: Option<f64>,
}

impl ReliabilityStats {
    pub fn new() -> Self {
        Self {
            packets_in_flight: 0,
            send_base: 0,
            next_seq: 0,
            total_sent: 0,
            total_acked: 0,
            total_retransmitted: 0,
            total_skipped: 0,
            srtt_ms: None,
        }
    }

    /// Jacobson/Karels-style exponential smoothing (alpha = 1/8), matching
    /// the common SRTT update used for RTT observability elsewhere in this
    /// codebase's lineage.
    pub fn record_rtt_sample(&mut self, sample_ms: f64) {
        self.srtt_ms = Some(match self.srtt_ms {
            Some(srtt) => srtt + (sample_ms - srtt) / 8.0,
            None => sample_ms,
        });
    }
}

impl Default for ReliabilityStats {
    fn default() -> Self {
        Self::new()
    }
}
