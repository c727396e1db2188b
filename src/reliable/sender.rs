// reliable/sender.rs - Selective-Repeat ARQ sender: bounded window,
// per-packet retransmission, bounded retry with forward-progress skip.
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::error::HudpError;
use crate::packet::{self, ChannelId};
use crate::sequence::seq_add;
use crate::socket::UdpSocket;
use crate::stats::ReliabilityStats;

use super::timer::TimerWheel;

struct PacketEntry {
    packet_bytes: Vec<u8>,
    first_send_time: Instant,
    retry_count: u32,
    /// Bumped on every retransmission; a timer fire whose generation does
    /// not match the entry's current generation refers to a timer that was
    /// superseded by a later retry and is discarded.
    generation: u64,
}

struct SenderState {
    send_base: u16,
    next_seq: u16,
    buffer: HashMap<u16, PacketEntry>,
    acked: HashSet<u16>,
    stats: ReliabilityStats,
}

struct SenderCore {
    socket: Arc<UdpSocket>,
    remote_addr: SocketAddr,
    window_size: u16,
    max_retries: u32,
    sender_timeout: Duration,
    state: Mutex<SenderState>,
    timer: TimerWheel,
}

impl SenderCore {
    fn on_timeout(&self, seq: u16, generation: u64) {
        let mut state = self.state.lock().unwrap();
        let should_retry;
        {
            let Some(entry) = state.buffer.get(&seq) else {
                return; // acked or already skipped
            };
            if entry.generation != generation {
                return; // stale timer, superseded by a later retry
            }
            should_retry = entry.retry_count < self.max_retries;
        }

        if should_retry {
            let entry = state.buffer.get_mut(&seq).unwrap();
            entry.retry_count += 1;
            entry.generation += 1;
            let bytes = entry.packet_bytes.clone();
            let next_generation = entry.generation;
            state.stats.total_retransmitted += 1;
            drop(state);

            if let Err(e) = self.socket.send_to(&bytes, self.remote_addr) {
                log::warn!("reliable sender: retransmit seq={seq} failed: {e}");
            } else {
                log::debug!("reliable sender: retry seq={seq}");
            }
            self.timer
                .schedule(seq, next_generation, Instant::now() + self.sender_timeout);
        } else {
            let elapsed = state
                .buffer
                .get(&seq)
                .map(|e| e.first_send_time.elapsed())
                .unwrap_or_default();
            state.buffer.remove(&seq);
            state.stats.total_skipped += 1;
            log::debug!("reliable sender: skip seq={seq} after max retries, elapsed={elapsed:?}");
            self.slide_window(&mut state);
        }
    }

    /// Advances `send_base` past every sequence that is acked or no longer
    /// tracked (acked or permanently skipped), stopping at `next_seq`.
    fn slide_window(&self, state: &mut SenderState) {
        let old_base = state.send_base;
        while state.acked.contains(&state.send_base) || !state.buffer.contains_key(&state.send_base)
        {
            if state.send_base == state.next_seq {
                break;
            }
            state.send_base = seq_add(state.send_base, 1);
        }
        if state.send_base != old_base {
            log::trace!(
                "reliable sender: window slide {} -> {}",
                old_base,
                state.send_base
            );
        }
    }
}

/// Handle to a running Selective-Repeat sender. Cheap to clone; clones
/// share the same window state and background timer thread.
#[derive(Clone)]
pub struct ReliableSender {
    core: Arc<SenderCore>,
}

impl ReliableSender {
    pub fn new(
        socket: Arc<UdpSocket>,
        remote_addr: SocketAddr,
        window_size: u16,
        max_retries: u32,
        sender_timeout: Duration,
    ) -> Self {
        let core = Arc::new_cyclic(|weak: &Weak<SenderCore>| {
            let weak_for_timer = weak.clone();
            let timer = TimerWheel::spawn(move |seq, generation| {
                if let Some(core) = weak_for_timer.upgrade() {
                    core.on_timeout(seq, generation);
                }
            });

            SenderCore {
                socket,
                remote_addr,
                window_size,
                max_retries,
                sender_timeout,
                state: Mutex::new(SenderState {
                    send_base: 0,
                    next_seq: 0,
                    buffer: HashMap::new(),
                    acked: HashSet::new(),
                    stats: ReliabilityStats::new(),
                }),
                timer,
            }
        });

        log::debug!("reliable sender initialized (window={window_size})");
        Self { core }
    }

    /// Sends `payload` on the reliable channel, returning its sequence
    /// number, or `Err(HudpError::WindowFull)` if the send window has no
    /// free slots.
    pub fn send(&self, payload: &[u8]) -> Result<u16, HudpError> {
        let mut state = self.core.state.lock().unwrap();

        let used = (state.next_seq.wrapping_sub(state.send_base)) as u32 % 65536;
        if used >= self.core.window_size as u32 {
            log::trace!(
                "reliable sender: window full (base={}, next={})",
                state.send_base,
                state.next_seq
            );
            return Err(HudpError::WindowFull);
        }

        let seq_no = state.next_seq;
        let bytes = packet::encode_data(ChannelId::Reliable, seq_no, payload)?;

        self.core.socket.send_to(&bytes, self.core.remote_addr)?;

        state.buffer.insert(
            seq_no,
            PacketEntry {
                packet_bytes: bytes,
                first_send_time: Instant::now(),
                retry_count: 0,
                generation: 0,
            },
        );
        state.stats.total_sent += 1;
        state.next_seq = seq_add(state.next_seq, 1);
        state.stats.next_seq = state.next_seq;
        state.stats.send_base = state.send_base;
        state.stats.packets_in_flight = state.buffer.len();

        self.core.timer.schedule(
            seq_no,
            0,
            Instant::now() + self.core.sender_timeout,
        );

        log::trace!(
            "reliable sender: sent seq={seq_no}, window=[{}, {})",
            state.send_base,
            state.next_seq
        );
        Ok(seq_no)
    }

    /// Processes an incoming ACK. Duplicate ACKs, and ACKs for sequences no
    /// longer tracked (already acked, or already skipped past), are benign
    /// no-ops — this is the resolution to the open question of whether a
    /// skipped sequence's late ACK should be treated as an error.
    pub fn on_ack(&self, ack_no: u16) {
        let mut state = self.core.state.lock().unwrap();

        if state.acked.contains(&ack_no) {
            log::trace!("reliable sender: duplicate ack {ack_no}");
            return;
        }
        let Some(entry) = state.buffer.remove(&ack_no) else {
            log::trace!("reliable sender: ack {ack_no} not in buffer");
            return;
        };

        let rtt_ms = entry.first_send_time.elapsed().as_secs_f64() * 1000.0;
        state.stats.record_rtt_sample(rtt_ms);
        state.acked.insert(ack_no);
        state.stats.total_acked += 1;
        state.stats.packets_in_flight = state.buffer.len();

        log::trace!("reliable sender: ack {ack_no} (rtt={rtt_ms:.1}ms)");
        self.core.slide_window(&mut state);
    }

    /// Window slots free for new sends right now.
    pub fn window_space(&self) -> u16 {
        let state = self.core.state.lock().unwrap();
        let used = (state.next_seq.wrapping_sub(state.send_base)) as u32 % 65536;
        self.core.window_size - used.min(self.core.window_size as u32) as u16
    }

    pub fn stats(&self) -> ReliabilityStats {
        self.core.state.lock().unwrap().stats.clone()
    }

    /// Cancels every outstanding retransmission timer and stops the timer
    /// wheel's background thread. Idempotent; safe to call from multiple
    /// clones sharing this sender's core.
    pub fn close(&self) {
        self.core.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::decode_data;

    fn pair() -> (Arc<UdpSocket>, SocketAddr, Arc<UdpSocket>) {
        let a = Arc::new(UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let b = Arc::new(UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let b_addr = b.local_addr().unwrap();
        (a, b_addr, b)
    }

    #[test]
    fn send_increments_sequence_and_delivers_bytes() {
        let (a, b_addr, b) = pair();
        let sender = ReliableSender::new(a, b_addr, 32, 1, Duration::from_millis(200));

        let seq0 = sender.send(b"hello").unwrap();
        let seq1 = sender.send(b"world").unwrap();
        assert_eq!(seq0, 0);
        assert_eq!(seq1, 1);

        let (data, _) = b.recv_from().unwrap();
        let decoded = decode_data(&data).unwrap();
        assert_eq!(decoded.seq_no, 0);
        assert_eq!(decoded.payload, b"hello");
    }

    #[test]
    fn window_full_rejects_send() {
        let (a, b_addr, b) = pair();
        let sender = ReliableSender::new(a, b_addr, 2, 1, Duration::from_millis(200));

        sender.send(b"a").unwrap();
        sender.send(b"b").unwrap();
        let err = sender.send(b"c").unwrap_err();
        assert!(matches!(err, HudpError::WindowFull));

        // drain so the test socket doesn't leak a full recv buffer
        let _ = b.recv_from();
        let _ = b.recv_from();
    }

    #[test]
    fn ack_slides_window_and_frees_space() {
        let (a, b_addr, b) = pair();
        let sender = ReliableSender::new(a, b_addr, 2, 1, Duration::from_millis(200));

        sender.send(b"a").unwrap();
        sender.send(b"b").unwrap();
        let _ = b.recv_from();
        let _ = b.recv_from();

        sender.on_ack(0);
        assert_eq!(sender.window_space(), 1);
        sender.send(b"c").unwrap();
        let _ = b.recv_from();
    }

    #[test]
    fn duplicate_and_unknown_acks_are_ignored() {
        let (a, b_addr, b) = pair();
        let sender = ReliableSender::new(a, b_addr, 32, 1, Duration::from_millis(200));

        sender.send(b"a").unwrap();
        let _ = b.recv_from();

        sender.on_ack(0);
        sender.on_ack(0); // duplicate
        sender.on_ack(99); // never sent
        assert_eq!(sender.stats().total_acked, 1);
    }

    #[test]
    fn lost_packet_is_retransmitted_then_skipped() {
        let (a, b_addr, b) = pair();
        let sender = ReliableSender::new(a, b_addr, 32, 1, Duration::from_millis(30));

        sender.send(b"only").unwrap();
        let (first, _) = b.recv_from().unwrap();
        let (retry, _) = b.recv_from().unwrap();
        assert_eq!(first, retry); // retransmission resends the exact bytes

        // No further retries beyond max_retries=1: the window eventually
        // slides past the skipped sequence without another ack.
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(sender.window_space(), 32);
        assert_eq!(sender.stats().total_skipped, 1);
    }
}
