// delivery.rs - the receiver-to-application hand-off.
use std::sync::mpsc::Sender;

/// Which channel a delivered unit arrived on. Carried as an explicit tag
/// rather than inferred from sequence number, since both channels share one
/// sequence space and a tag is unambiguous where a bare number is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Reliable,
    Unreliable,
}

/// A single unit delivered to the application, tagged with its channel and
/// a measured one-way latency estimate (wall-clock, sender-to-receiver).
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub channel: Channel,
    pub seq_no: u16,
    pub payload: Vec<u8>,
    pub latency_ms: u32,
}

/// The receiver's hand-off point to its application. Replaces a duck-typed
/// callback with one explicit trait method; the mpsc sender the facade
/// constructs its delivery queue from implements it directly.
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, record: DeliveryRecord);
}

impl DeliverySink for Sender<DeliveryRecord> {
    fn deliver(&self, record: DeliveryRecord) {
        // The application dropped its receiving end; there is nothing
        // further to deliver to, so the drop is silent rather than a panic.
        let _ = self.send(record);
    }
}
