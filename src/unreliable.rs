// unreliable.rs - fire-and-forget channel: stamp, send; decode, measure
// latency, deliver. No ordering, no dedup, no retransmission.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::delivery::{Channel, DeliveryRecord, DeliverySink};
use crate::error::HudpError;
use crate::packet::{self, current_timestamp_ms, latency_ms, ChannelId};
use crate::sequence::seq_add;
use crate::socket::UdpSocket;

/// Stamps each send with a monotonically increasing sequence number. The
/// sequence is purely informational on this channel — there is no window,
/// no ack, and no retry.
pub struct UnreliableSender {
    socket: Arc<UdpSocket>,
    remote_addr: SocketAddr,
    next_seq: AtomicU16,
}

impl UnreliableSender {
    pub fn new(socket: Arc<UdpSocket>, remote_addr: SocketAddr) -> Self {
        log::debug!("unreliable sender initialized");
        Self {
            socket,
            remote_addr,
            next_seq: AtomicU16::new(0),
        }
    }

    /// Encodes and sends `payload`, returning its sequence number.
    pub fn send(&self, payload: &[u8]) -> Result<u16, HudpError> {
        let seq_no = self.next_seq.fetch_update(
            AtomicOrdering::SeqCst,
            AtomicOrdering::SeqCst,
            |cur| Some(seq_add(cur, 1)),
        );
        // `fetch_update` returns the pre-update value.
        let seq_no = seq_no.unwrap();

        let bytes = packet::encode_data(ChannelId::Unreliable, seq_no, payload)?;
        self.socket.send_to(&bytes, self.remote_addr)?;
        log::trace!("unreliable sender: sent seq={seq_no}");
        Ok(seq_no)
    }
}

/// Decodes an unreliable DATA frame, measures its latency, and hands it
/// straight to the delivery sink.
pub struct UnreliableReceiver {
    sink: Arc<dyn DeliverySink>,
}

impl UnreliableReceiver {
    pub fn new(sink: Arc<dyn DeliverySink>) -> Self {
        log::debug!("unreliable receiver initialized");
        Self { sink }
    }

    pub fn on_receive(&self, seq_no: u16, timestamp: u32, payload: Vec<u8>) {
        let latency = latency_ms(current_timestamp_ms(), timestamp);
        log::trace!("unreliable receiver: delivered seq={seq_no} latency={latency}ms");
        self.sink.deliver(DeliveryRecord {
            channel: Channel::Unreliable,
            seq_no,
            payload,
            latency_ms: latency,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::decode_data;
    use std::sync::mpsc;

    #[test]
    fn sender_stamps_increasing_sequence_numbers() {
        let a = Arc::new(UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let b = Arc::new(UdpSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let b_addr = b.local_addr().unwrap();
        let sender = UnreliableSender::new(a, b_addr);

        assert_eq!(sender.send(b"x").unwrap(), 0);
        assert_eq!(sender.send(b"y").unwrap(), 1);

        let (data, _) = b.recv_from().unwrap();
        assert_eq!(decode_data(&data).unwrap().seq_no, 0);
    }

    #[test]
    fn receiver_delivers_with_measured_latency() {
        let (tx, rx) = mpsc::channel();
        let receiver = UnreliableReceiver::new(Arc::new(tx));

        let now = current_timestamp_ms();
        receiver.on_receive(5, now.wrapping_sub(20), b"payload".to_vec());

        let record = rx.recv_timeout(std::time::Duration::from_millis(100)).unwrap();
        assert_eq!(record.channel, Channel::Unreliable);
        assert_eq!(record.seq_no, 5);
        assert_eq!(record.payload, b"payload");
        assert!(record.latency_ms >= 20);
    }
}
