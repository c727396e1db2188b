// reliable/receiver.rs - Selective-Repeat ARQ receiver: reordering buffer,
// in-order delivery, and a skip timer that guarantees forward progress.
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::delivery::{Channel, DeliveryRecord, DeliverySink};
use crate::packet::{self, current_timestamp_ms, latency_ms};
use crate::sequence::{seq_add, seq_ge, seq_lt};
use crate::socket::UdpSocket;

struct BufferedPacket {
    payload: Vec<u8>,
    timestamp: u32,
}

struct ReceiverState {
    rcv_base: u16,
    buffer: HashMap<u16, BufferedPacket>,
    delivered: HashSet<u16>,
    /// When the current `rcv_base` started waiting for its packet. At most
    /// one entry is ever live, and it always pertains to the current
    /// `rcv_base` — there is no need for a map keyed by sequence.
    waiting_since: Option<Instant>,
}

struct ReceiverCore {
    socket: Arc<UdpSocket>,
    window_size: u16,
    receiver_timeout: Duration,
    sink: Arc<dyn DeliverySink>,
    state: Mutex<ReceiverState>,
}

impl ReceiverCore {
    fn send_ack(&self, ack_no: u16, timestamp: u32, addr: SocketAddr) {
        let bytes = packet::encode_ack(ack_no, timestamp);
        if let Err(e) = self.socket.send_to(&bytes, addr) {
            log::warn!("reliable receiver: failed to ack seq={ack_no}: {e}");
        }
    }

    fn deliver_packet(&self, state: &mut ReceiverState, seq_no: u16, payload: Vec<u8>, timestamp: u32) {
        state.delivered.insert(seq_no);
        let latency = latency_ms(current_timestamp_ms(), timestamp);
        self.sink.deliver(DeliveryRecord {
            channel: Channel::Reliable,
            seq_no,
            payload,
            latency_ms: latency,
        });
    }

    fn deliver_buffered(&self, state: &mut ReceiverState) {
        while let Some(buffered) = state.buffer.remove(&state.rcv_base) {
            let seq_no = state.rcv_base;
            self.deliver_packet(state, seq_no, buffered.payload, buffered.timestamp);
            state.waiting_since = None;
            state.rcv_base = seq_add(state.rcv_base, 1);
        }
    }

    fn on_receive(&self, seq_no: u16, timestamp: u32, payload: Vec<u8>, sender_addr: SocketAddr) {
        let mut state = self.state.lock().unwrap();

        if state.delivered.contains(&seq_no) {
            self.send_ack(seq_no, timestamp, sender_addr);
            log::trace!("reliable receiver: duplicate seq={seq_no}");
            return;
        }

        if seq_lt(seq_no, state.rcv_base) {
            self.send_ack(seq_no, timestamp, sender_addr);
            log::trace!(
                "reliable receiver: old seq={seq_no} < rcv_base={}",
                state.rcv_base
            );
            return;
        }

        if seq_ge(seq_no, seq_add(state.rcv_base, self.window_size)) {
            log::debug!(
                "reliable receiver: reject seq={seq_no}, too far ahead of rcv_base={}",
                state.rcv_base
            );
            return;
        }

        self.send_ack(seq_no, timestamp, sender_addr);

        if seq_no == state.rcv_base {
            state.waiting_since = None;
            self.deliver_packet(&mut state, seq_no, payload, timestamp);
            state.rcv_base = seq_add(state.rcv_base, 1);
            self.deliver_buffered(&mut state);
        } else {
            state.buffer.insert(seq_no, BufferedPacket { payload, timestamp });
            if state.waiting_since.is_none() {
                state.waiting_since = Some(Instant::now());
            }
            log::trace!(
                "reliable receiver: buffered seq={seq_no}, waiting for {}",
                state.rcv_base
            );
        }
    }

    /// Called on a fixed tick by the skip-check thread. If `rcv_base` has
    /// been stalled for at least `receiver_timeout`, abandon it so the
    /// stream can make forward progress past a permanently lost packet.
    fn check_skip(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(since) = state.waiting_since {
            if since.elapsed() >= self.receiver_timeout {
                log::debug!(
                    "reliable receiver: skip rcv_base={} after {:?}",
                    state.rcv_base,
                    since.elapsed()
                );
                state.waiting_since = None;
                state.rcv_base = seq_add(state.rcv_base, 1);
                self.deliver_buffered(&mut state);
            }
        }
    }
}

/// Handle to a running Selective-Repeat receiver. Owns a background thread
/// that checks for a permanently stalled `rcv_base` every
/// `skip_check_interval`; dropping the handle stops that thread.
pub struct ReliableReceiver {
    core: Arc<ReceiverCore>,
    running: Arc<AtomicBool>,
    skip_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ReliableReceiver {
    pub fn new(
        socket: Arc<UdpSocket>,
        sink: Arc<dyn DeliverySink>,
        window_size: u16,
        receiver_timeout: Duration,
        skip_check_interval: Duration,
    ) -> Self {
        let core = Arc::new(ReceiverCore {
            socket,
            window_size,
            receiver_timeout,
            sink,
            state: Mutex::new(ReceiverState {
                rcv_base: 0,
                buffer: HashMap::new(),
                delivered: HashSet::new(),
                waiting_since: None,
            }),
        });

        let running = Arc::new(AtomicBool::new(true));
        let thread_core = Arc::clone(&core);
        let thread_running = Arc::clone(&running);
        let skip_thread = std::thread::spawn(move || {
            while thread_running.load(AtomicOrdering::Acquire) {
                std::thread::sleep(skip_check_interval);
                if thread_running.load(AtomicOrdering::Acquire) {
                    thread_core.check_skip();
                }
            }
        });

        log::debug!("reliable receiver initialized (window={window_size})");
        Self {
            core,
            running,
            skip_thread: Mutex::new(Some(skip_thread)),
        }
    }

    pub fn on_receive(&self, seq_no: u16, timestamp: u32, payload: Vec<u8>, sender_addr: SocketAddr) {
        self.core.on_receive(seq_no, timestamp, payload, sender_addr);
    }

    /// Stops the background skip-check thread and joins it. Idempotent —
    /// a second call finds the thread handle already taken and is a no-op.
    pub fn close(&self) {
        self.running.store(false, AtomicOrdering::Release);
        if let Some(handle) = self.skip_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReliableReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn harness(
        window_size: u16,
        receiver_timeout: Duration,
    ) -> (ReliableReceiver, mpsc::Receiver<DeliveryRecord>, SocketAddr) {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let (tx, rx) = mpsc::channel();
        let receiver = ReliableReceiver::new(
            socket,
            Arc::new(tx),
            window_size,
            receiver_timeout,
            Duration::from_millis(10),
        );
        let fake_sender_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        (receiver, rx, fake_sender_addr)
    }

    #[test]
    fn in_order_delivery() {
        let (receiver, rx, addr) = harness(32, Duration::from_millis(200));
        receiver.on_receive(0, 1000, b"a".to_vec(), addr);
        receiver.on_receive(1, 1010, b"b".to_vec(), addr);

        let r0 = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        let r1 = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(r0.seq_no, 0);
        assert_eq!(r1.seq_no, 1);
    }

    #[test]
    fn reordered_packets_are_buffered_then_delivered_in_order() {
        let (receiver, rx, addr) = harness(32, Duration::from_millis(200));
        receiver.on_receive(1, 1000, b"b".to_vec(), addr);
        receiver.on_receive(0, 1000, b"a".to_vec(), addr);

        let r0 = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        let r1 = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(r0.seq_no, 0);
        assert_eq!(r1.seq_no, 1);
    }

    #[test]
    fn duplicate_delivered_packet_is_not_redelivered() {
        let (receiver, rx, addr) = harness(32, Duration::from_millis(200));
        receiver.on_receive(0, 1000, b"a".to_vec(), addr);
        receiver.on_receive(0, 1000, b"a".to_vec(), addr);

        let _ = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn stalled_base_is_skipped_and_unblocks_buffered_packets() {
        let (receiver, rx, addr) = harness(32, Duration::from_millis(50));
        receiver.on_receive(1, 1000, b"b".to_vec(), addr);

        let delivered = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(delivered.seq_no, 1);
    }

    #[test]
    fn too_far_ahead_is_rejected_without_ack_or_delivery() {
        let (receiver, rx, addr) = harness(4, Duration::from_millis(200));
        receiver.on_receive(10, 1000, b"z".to_vec(), addr);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
