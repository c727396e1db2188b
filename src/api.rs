// api.rs - role-gated public facade: construction, send, receive, lifecycle.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc::{self, Receiver as MpscReceiver};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{NetworkConfig, Role};
use crate::delivery::{Channel, DeliveryRecord, DeliverySink};
use crate::dispatcher::Dispatcher;
use crate::error::HudpError;
use crate::reliable::{ReliableReceiver, ReliableSender};
use crate::socket::UdpSocket;
use crate::tracking::{DeliveryStats, DeliveryTracker};
use crate::unreliable::{UnreliableReceiver, UnreliableSender};

/// Routes each delivered record into the application-facing queue and, if
/// tracking is enabled, records it as received first.
struct TrackingSink {
    queue: mpsc::Sender<DeliveryRecord>,
    tracker: Option<Arc<DeliveryTracker>>,
}

impl DeliverySink for TrackingSink {
    fn deliver(&self, record: DeliveryRecord) {
        if let Some(tracker) = &self.tracker {
            tracker.record_received(record.channel, record.seq_no);
        }
        let _ = self.queue.send(record);
    }
}

enum RoleState {
    Sender {
        reliable: ReliableSender,
        unreliable: UnreliableSender,
        dispatcher: Dispatcher,
    },
    Receiver {
        delivery_queue: MpscReceiver<DeliveryRecord>,
        reliable: Arc<ReliableReceiver>,
        unreliable: Arc<UnreliableReceiver>,
        dispatcher: Dispatcher,
    },
}

/// A single H-UDP peer: either the `Sender` or `Receiver` half of exactly
/// one reliable + unreliable channel pair, gated by the role it was
/// constructed with.
pub struct HudpEndpoint {
    socket: Arc<UdpSocket>,
    role: Role,
    state: RoleState,
    tracker: Option<Arc<DeliveryTracker>>,
    closed: AtomicBool,
}

impl HudpEndpoint {
    /// Builds and starts an endpoint from a validated configuration.
    pub fn new(config: NetworkConfig) -> Result<Self, HudpError> {
        config
            .validate()
            .map_err(|_| HudpError::Malformed("invalid configuration"))?;

        let socket = Arc::new(UdpSocket::bind(config.local_addr())?);
        // The delivery-tracking observer is subscribed, not baked in: a
        // config that opts out gets a hot path with no tracker at all.
        let tracker = config
            .track_delivery
            .then(|| Arc::new(DeliveryTracker::new()));

        let state = match config.role {
            Role::Sender => {
                let remote_addr = config
                    .remote_addr
                    .expect("validated: sender always has a remote_addr");
                let reliable = ReliableSender::new(
                    Arc::clone(&socket),
                    remote_addr,
                    config.window_size,
                    config.max_retries,
                    config.sender_timeout,
                );
                let unreliable = UnreliableSender::new(Arc::clone(&socket), remote_addr);
                let dispatcher = Dispatcher::spawn_sender(
                    Arc::clone(&socket),
                    reliable.clone(),
                    tracker.clone(),
                );
                RoleState::Sender {
                    reliable,
                    unreliable,
                    dispatcher,
                }
            }
            Role::Receiver => {
                let (tx, rx) = mpsc::channel();
                let sink: Arc<dyn DeliverySink> = Arc::new(TrackingSink {
                    queue: tx,
                    tracker: tracker.clone(),
                });
                let reliable = Arc::new(ReliableReceiver::new(
                    Arc::clone(&socket),
                    Arc::clone(&sink),
                    config.window_size,
                    config.receiver_timeout,
                    config.skip_check_interval,
                ));
                let unreliable = Arc::new(UnreliableReceiver::new(sink));
                let dispatcher = Dispatcher::spawn_receiver(
                    Arc::clone(&socket),
                    Arc::clone(&reliable),
                    Arc::clone(&unreliable),
                );
                RoleState::Receiver {
                    delivery_queue: rx,
                    reliable,
                    unreliable,
                    dispatcher,
                }
            }
        };

        log::info!("hudp endpoint bound at {}", socket.local_addr()?);
        Ok(Self {
            socket,
            role: config.role,
            state,
            tracker,
            closed: AtomicBool::new(false),
        })
    }

    /// Sends `payload`. `reliable = true` uses the Selective-Repeat
    /// channel (fails with `WindowFull` if the window has no space);
    /// `reliable = false` uses the fire-and-forget channel.
    pub fn send(&self, payload: &[u8], reliable: bool) -> Result<u16, HudpError> {
        let RoleState::Sender {
            reliable: reliable_sender,
            unreliable: unreliable_sender,
            ..
        } = &self.state
        else {
            return Err(HudpError::WrongRole);
        };

        let (seq_no, channel) = if reliable {
            (reliable_sender.send(payload)?, Channel::Reliable)
        } else {
            (unreliable_sender.send(payload)?, Channel::Unreliable)
        };

        if let Some(tracker) = &self.tracker {
            tracker.record_sent(channel, seq_no);
        }
        Ok(seq_no)
    }

    /// Blocks for the next delivered record, up to `timeout` (blocks
    /// indefinitely if `None`). Returns `None` on timeout.
    pub fn receive(&self, timeout: Option<Duration>) -> Result<Option<DeliveryRecord>, HudpError> {
        let RoleState::Receiver { delivery_queue, .. } = &self.state else {
            return Err(HudpError::WrongRole);
        };

        let record = match timeout {
            Some(timeout) => delivery_queue.recv_timeout(timeout).ok(),
            None => delivery_queue.recv().ok(),
        };
        Ok(record)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HudpError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Snapshot of in-memory sent/received bookkeeping and delivery ratios,
    /// observed from this endpoint's own side of the wire.
    pub fn delivery_stats(&self) -> Option<DeliveryStats> {
        self.tracker.as_ref().map(|t| t.snapshot())
    }

    /// Stops the dispatcher and cancels every outstanding timer / background
    /// task owned by this endpoint's sub-sender or sub-receiver, then joins
    /// them. Idempotent — calling it more than once after the first has no
    /// further effect. The socket itself is released once every handle that
    /// shares it (dispatcher, reliable sender/receiver) has been joined and
    /// the endpoint is dropped.
    pub fn close(&self) {
        if self.closed.swap(true, AtomicOrdering::AcqRel) {
            return;
        }

        match &self.state {
            RoleState::Sender {
                reliable,
                dispatcher,
                ..
            } => {
                dispatcher.stop();
                reliable.close();
            }
            RoleState::Receiver {
                reliable,
                dispatcher,
                ..
            } => {
                dispatcher.stop();
                reliable.close();
            }
        }

        log::info!("hudp endpoint closed");
    }
}

impl Drop for HudpEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
