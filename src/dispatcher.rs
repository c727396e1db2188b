// dispatcher.rs - the one receive loop demultiplexing ACK vs DATA, and
// DATA vs channel, for a single bound socket.
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::delivery::Channel;
use crate::packet::{self, ChannelId};
use crate::reliable::{ReliableReceiver, ReliableSender};
use crate::socket::UdpSocket;
use crate::tracking::DeliveryTracker;
use crate::unreliable::UnreliableReceiver;

/// Read timeout the dispatcher's blocking `recv_from` uses so it can
/// periodically check the shutdown flag instead of blocking forever.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(500);

enum Role {
    Sender {
        reliable: ReliableSender,
        tracker: Option<Arc<DeliveryTracker>>,
    },
    Receiver {
        reliable: Arc<ReliableReceiver>,
        unreliable: Arc<UnreliableReceiver>,
    },
}

/// Owns the background thread that reads datagrams off a socket and routes
/// them to the reliable/unreliable state machines.
pub struct Dispatcher {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn spawn_sender(
        socket: Arc<UdpSocket>,
        reliable: ReliableSender,
        tracker: Option<Arc<DeliveryTracker>>,
    ) -> Self {
        Self::spawn(socket, Role::Sender { reliable, tracker })
    }

    pub fn spawn_receiver(
        socket: Arc<UdpSocket>,
        reliable: Arc<ReliableReceiver>,
        unreliable: Arc<UnreliableReceiver>,
    ) -> Self {
        Self::spawn(socket, Role::Receiver { reliable, unreliable })
    }

    fn spawn(socket: Arc<UdpSocket>, role: Role) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        if let Err(e) = socket.set_read_timeout(Some(RECV_POLL_INTERVAL)) {
            log::warn!("dispatcher: failed to set read timeout: {e}");
        }

        let handle = std::thread::spawn(move || {
            while thread_running.load(AtomicOrdering::Acquire) {
                match socket.recv_from() {
                    Ok((data, addr)) => Self::dispatch(&role, &data, addr),
                    Err(e) if e.is_timeout() => continue,
                    Err(e) => {
                        if thread_running.load(AtomicOrdering::Acquire) {
                            log::warn!("dispatcher: socket error: {e}");
                        }
                    }
                }
            }
        });

        Self {
            running,
            handle: Mutex::new(Some(handle)),
        }
    }

    fn dispatch(role: &Role, data: &[u8], addr: std::net::SocketAddr) {
        match role {
            Role::Sender { reliable, tracker } => {
                if !packet::is_ack(data) {
                    log::debug!("dispatcher(sender): ignoring non-ack datagram from {addr}");
                    return;
                }
                let Ok(ack) = packet::decode_ack(data) else {
                    log::debug!("dispatcher(sender): malformed ack from {addr}");
                    return;
                };
                reliable.on_ack(ack.ack_no);
                if let Some(tracker) = tracker {
                    tracker.record_received(Channel::Reliable, ack.ack_no);
                }
            }
            Role::Receiver { reliable, unreliable } => {
                if packet::is_ack(data) {
                    log::trace!("dispatcher(receiver): ignoring stray ack from {addr}");
                    return;
                }
                let Ok(decoded) = packet::decode_data(data) else {
                    log::debug!("dispatcher(receiver): malformed datagram from {addr}");
                    return;
                };
                match decoded.channel {
                    ChannelId::Reliable => {
                        reliable.on_receive(decoded.seq_no, decoded.timestamp, decoded.payload, addr)
                    }
                    ChannelId::Unreliable => unreliable.on_receive(
                        decoded.seq_no,
                        decoded.timestamp,
                        decoded.payload,
                    ),
                }
            }
        }
    }

    /// Flips the running flag off and joins the receive thread. Idempotent
    /// — a second call finds the handle already taken and is a no-op.
    pub fn stop(&self) {
        self.running.store(false, AtomicOrdering::Release);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
