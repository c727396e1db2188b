// packet.rs - wire codec for DATA and ACK frames.
//
// DATA frame (9-byte header + payload):
//   channel_type:u8 | seq_no:u16 BE | timestamp:u32 BE | payload_len:u16 BE | payload
// ACK frame (7 bytes):
//   packet_type:u8 (0x02) | ack_no:u16 BE | timestamp:u32 BE
use byteorder::{BigEndian, ByteOrder};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::HudpError;

/// Maximum payload a DATA frame may carry. Chosen to fit a conservative
/// Ethernet MTU minus IPv4 + UDP + the 9-byte header.
pub const MAX_PAYLOAD_SIZE: usize = 1391;

const DATA_HEADER_SIZE: usize = 9;
const ACK_PACKET_SIZE: usize = 7;
const ACK_PACKET_TYPE: u8 = 0x02;

/// Which delivery discipline a DATA frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelId {
    Reliable = 0x00,
    Unreliable = 0x01,
}

impl TryFrom<u8> for ChannelId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ChannelId::Reliable),
            0x01 => Ok(ChannelId::Unreliable),
            _ => Err(()),
        }
    }
}

/// A decoded DATA frame.
#[derive(Debug, Clone)]
pub struct DecodedData {
    pub channel: ChannelId,
    pub seq_no: u16,
    pub timestamp: u32,
    pub payload: Vec<u8>,
}

/// A decoded ACK frame.
#[derive(Debug, Clone, Copy)]
pub struct DecodedAck {
    pub ack_no: u16,
    pub timestamp: u32,
}

/// Current wall-clock millisecond counter, wrapped to 32 bits.
pub fn current_timestamp_ms() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// Encodes a DATA frame, stamping a fresh wall-clock timestamp.
pub fn encode_data(channel: ChannelId, seq_no: u16, payload: &[u8]) -> Result<Vec<u8>, HudpError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(HudpError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = vec![0u8; DATA_HEADER_SIZE + payload.len()];
    buf[0] = channel as u8;
    BigEndian::write_u16(&mut buf[1..3], seq_no);
    BigEndian::write_u32(&mut buf[3..7], current_timestamp_ms());
    BigEndian::write_u16(&mut buf[7..9], payload.len() as u16);
    buf[DATA_HEADER_SIZE..].copy_from_slice(payload);
    Ok(buf)
}

/// Decodes a DATA frame. Fails if the buffer is shorter than the fixed
/// header, or if `payload_len` claims more bytes than are actually present.
pub fn decode_data(data: &[u8]) -> Result<DecodedData, HudpError> {
    if data.len() < DATA_HEADER_SIZE {
        return Err(HudpError::Malformed("data frame shorter than header"));
    }

    let channel = ChannelId::try_from(data[0])
        .map_err(|_| HudpError::Malformed("unknown channel_type byte"))?;
    let seq_no = BigEndian::read_u16(&data[1..3]);
    let timestamp = BigEndian::read_u32(&data[3..7]);
    let payload_len = BigEndian::read_u16(&data[7..9]) as usize;

    if data.len() < DATA_HEADER_SIZE + payload_len {
        return Err(HudpError::Malformed("payload_len exceeds remaining bytes"));
    }

    let payload = data[DATA_HEADER_SIZE..DATA_HEADER_SIZE + payload_len].to_vec();
    Ok(DecodedData {
        channel,
        seq_no,
        timestamp,
        payload,
    })
}

/// Encodes an ACK frame, echoing the timestamp from the DATA frame it acks.
pub fn encode_ack(ack_no: u16, timestamp: u32) -> Vec<u8> {
    let mut buf = vec![0u8; ACK_PACKET_SIZE];
    buf[0] = ACK_PACKET_TYPE;
    BigEndian::write_u16(&mut buf[1..3], ack_no);
    BigEndian::write_u32(&mut buf[3..7], timestamp);
    buf
}

/// Decodes an ACK frame.
pub fn decode_ack(data: &[u8]) -> Result<DecodedAck, HudpError> {
    if data.len() < ACK_PACKET_SIZE {
        return Err(HudpError::Malformed("ack frame shorter than 7 bytes"));
    }
    if data[0] != ACK_PACKET_TYPE {
        return Err(HudpError::Malformed("not an ack frame"));
    }
    let ack_no = BigEndian::read_u16(&data[1..3]);
    let timestamp = BigEndian::read_u32(&data[3..7]);
    Ok(DecodedAck { ack_no, timestamp })
}

/// Discriminates a raw datagram: `true` if it is an ACK frame.
pub fn is_ack(data: &[u8]) -> bool {
    !data.is_empty() && data[0] == ACK_PACKET_TYPE
}

/// Wrap-tolerant latency: `(now_ms - sent_ms) mod 2^32`.
pub fn latency_ms(now_ms: u32, sent_ms: u32) -> u32 {
    now_ms.wrapping_sub(sent_ms)
}
