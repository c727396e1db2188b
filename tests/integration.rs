//! End-to-end tests driving two `HudpEndpoint`s over real loopback UDP
//! sockets, covering the literal scenarios and invariants this protocol is
//! specified against.
use std::time::Duration;

use hudp::prelude::*;

fn pair(window_size: u16, sender_timeout: Duration, receiver_timeout: Duration) -> (HudpEndpoint, HudpEndpoint) {
    let receiver_config = NetworkConfig::new(Role::Receiver, 0)
        .with_window_size(window_size)
        .with_receiver_timeout(receiver_timeout);
    let receiver = HudpEndpoint::new(receiver_config).unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    let sender_config = NetworkConfig::new(Role::Sender, 0)
        .with_remote_addr(receiver_addr)
        .with_window_size(window_size)
        .with_sender_timeout(sender_timeout);
    let sender = HudpEndpoint::new(sender_config).unwrap();

    (sender, receiver)
}

#[test]
fn happy_path_reliable_delivery() {
    let _ = env_logger::try_init();
    let (sender, receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));

    let seq = sender.send(b"A", true).unwrap();
    assert_eq!(seq, 0);

    let record = receiver
        .receive(Some(Duration::from_millis(500)))
        .unwrap()
        .expect("expected a delivery");
    assert_eq!(record.channel, Channel::Reliable);
    assert_eq!(record.seq_no, 0);
    assert_eq!(record.payload, b"A");

    // The sender's window should slide once the receiver's ack lands.
    std::thread::sleep(Duration::from_millis(50));
    let next = sender.send(b"B", true).unwrap();
    assert_eq!(next, 1);
}

#[test]
fn unreliable_channel_delivers_in_arrival_order_with_latency() {
    let (sender, receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));

    sender.send(b"x", false).unwrap();
    sender.send(b"y", false).unwrap();

    let r0 = receiver
        .receive(Some(Duration::from_millis(500)))
        .unwrap()
        .unwrap();
    let r1 = receiver
        .receive(Some(Duration::from_millis(500)))
        .unwrap()
        .unwrap();

    assert_eq!(r0.channel, Channel::Unreliable);
    assert_eq!(r0.seq_no, 0);
    assert_eq!(r1.seq_no, 1);
}

#[test]
fn reliable_packets_deliver_in_order_end_to_end() {
    // Reordering/skip behavior against a scrambled arrival order is
    // covered at the `ReliableReceiver` unit level (reliable/receiver.rs),
    // which can drive `on_receive` directly out of order. This checks the
    // same ordering guarantee holds through the full facade + real socket
    // path.
    let (sender, receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));

    for payload in [b"0".as_slice(), b"1", b"2"] {
        sender.send(payload, true).unwrap();
    }

    for expected_seq in 0u16..3 {
        let record = receiver
            .receive(Some(Duration::from_millis(500)))
            .unwrap()
            .unwrap();
        assert_eq!(record.seq_no, expected_seq);
        assert_eq!(record.channel, Channel::Reliable);
    }
}

#[test]
fn window_full_is_reported_without_blocking() {
    let (sender, _receiver) = pair(2, Duration::from_secs(10), Duration::from_secs(10));

    sender.send(b"a", true).unwrap();
    sender.send(b"b", true).unwrap();
    let err = sender.send(b"c", true).unwrap_err();
    assert!(matches!(err, HudpError::WindowFull));
}

#[test]
fn sender_role_cannot_call_receive() {
    let (sender, _receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));
    let err = sender.receive(Some(Duration::from_millis(10))).unwrap_err();
    assert!(matches!(err, HudpError::WrongRole));
}

#[test]
fn receiver_role_cannot_call_send() {
    let (_sender, receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));
    let err = receiver.send(b"x", true).unwrap_err();
    assert!(matches!(err, HudpError::WrongRole));
}

#[test]
fn oversize_payload_is_rejected_at_the_boundary() {
    let (sender, _receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));
    let oversized = vec![0u8; MAX_PAYLOAD_SIZE + 1];

    let err = sender.send(&oversized, true).unwrap_err();
    assert!(matches!(err, HudpError::PayloadTooLarge { .. }));

    let err = sender.send(&oversized, false).unwrap_err();
    assert!(matches!(err, HudpError::PayloadTooLarge { .. }));
}

#[test]
fn delivery_stats_track_sent_and_received_counts() {
    let (sender, receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));

    sender.send(b"a", true).unwrap();
    sender.send(b"b", false).unwrap();
    let _ = receiver.receive(Some(Duration::from_millis(500))).unwrap();
    let _ = receiver.receive(Some(Duration::from_millis(500))).unwrap();

    std::thread::sleep(Duration::from_millis(50));

    let sender_stats = sender.delivery_stats().unwrap();
    assert_eq!(sender_stats.total_sent, 2);

    let receiver_stats = receiver.delivery_stats().unwrap();
    assert_eq!(receiver_stats.total_received, 2);
}

#[test]
fn receive_times_out_when_nothing_arrives() {
    let (_sender, receiver) = pair(32, Duration::from_millis(200), Duration::from_millis(200));
    let result = receiver.receive(Some(Duration::from_millis(50))).unwrap();
    assert!(result.is_none());
}

#[test]
fn long_in_order_run_keeps_window_and_delivery_consistent() {
    // Forcing an actual 65535 -> 0 wrap would mean 65k+ round trips; the
    // comparator itself is covered at boundary values by sequence.rs's own
    // tests (I-Seq-Order). This instead checks that the window keeps
    // sliding correctly over many acked sends in a row, which is the
    // precondition for wraparound ever being reached without desync.
    let (sender, receiver) = pair(8, Duration::from_millis(50), Duration::from_millis(50));

    let total = 40u32;
    for i in 0..total {
        let payload = format!("{i}");
        sender.send(payload.as_bytes(), true).unwrap();
        let record = receiver
            .receive(Some(Duration::from_millis(500)))
            .unwrap()
            .unwrap();
        assert_eq!(record.seq_no as u32, i % 65536);
        assert_eq!(record.payload, payload.as_bytes());
    }
}
