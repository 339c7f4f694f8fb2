//! Integration tests for whole transfers over the loopback interface.
//!
//! Each test binds a sender and a receiver engine to OS-assigned loopback
//! ports and runs both as separate tokio tasks so they make progress
//! concurrently.

use std::net::SocketAddr;
use std::time::Duration;

use gbn_transfer::{
    fault::FaultConfig,
    frame::{self, Ack, Frame, TERMINATE},
    socket::Socket,
    Delivery, Error, ReceiverConfig, ReceiverEngine, SenderConfig, SenderEngine, TransferStats,
};

/// Bind a socket to an OS-assigned port on loopback.
async fn ephemeral() -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn fast_sender() -> SenderConfig {
    SenderConfig {
        timeout: Duration::from_millis(20),
        ..SenderConfig::default()
    }
}

/// Run one transfer of `payload` and return both ends' results.
async fn transfer(
    payload: Vec<u8>,
    sender_cfg: SenderConfig,
    receiver_cfg: ReceiverConfig,
) -> (Delivery, TransferStats) {
    let rx_sock = ephemeral().await;
    let rx_addr = rx_sock.local_addr;
    let mut rx = ReceiverEngine::new(rx_sock, receiver_cfg).expect("receiver config");
    let receiver = tokio::spawn(async move { rx.receive().await });

    let mut tx = SenderEngine::new(ephemeral().await, rx_addr, sender_cfg).expect("sender config");
    let sender = tokio::spawn(async move { tx.send(&payload).await });

    let (rr, sr) = tokio::join!(receiver, sender);
    (
        rr.unwrap().expect("receiver failed"),
        sr.unwrap().expect("sender failed"),
    )
}

// ---------------------------------------------------------------------------
// Test 1: clean transfers of assorted sizes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_roundtrip_assorted_sizes() {
    for len in [0usize, 10, 128, 64 * 5, 64 * 5 + 3] {
        let payload = pattern(len);
        let cfg = SenderConfig {
            packet_size: 64,
            ..fast_sender()
        };
        let (delivery, stats) = transfer(payload.clone(), cfg, ReceiverConfig::default()).await;
        assert_eq!(delivery.payload, payload, "payload of {len} bytes corrupted");
        assert_eq!(stats.frames as usize, len.div_ceil(64) + 1);
    }
}

// ---------------------------------------------------------------------------
// Test 2: 5000 bytes in 2048-byte packets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_five_thousand_bytes_default_packets() {
    let payload = pattern(5000);
    let (delivery, stats) =
        transfer(payload.clone(), fast_sender(), ReceiverConfig::default()).await;
    assert_eq!(stats.frames, 4);
    assert_eq!(delivery.payload, payload);
    assert_eq!(delivery.stats.accepted, 4);
}

// ---------------------------------------------------------------------------
// Test 3: window of 1 degenerates to stop-and-wait
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_window_of_one() {
    let payload = pattern(1000);
    let cfg = SenderConfig {
        window_size: 1,
        packet_size: 100,
        ..fast_sender()
    };
    let (delivery, stats) = transfer(payload.clone(), cfg, ReceiverConfig::default()).await;
    assert_eq!(delivery.payload, payload);
    assert_eq!(stats.frames, 11);
}

// ---------------------------------------------------------------------------
// Test 4: loss never stalls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_thirty_percent_loss_completes_in_bounded_rounds() {
    let payload = pattern(50 * 64);
    let cfg = SenderConfig {
        packet_size: 64,
        timeout: Duration::from_millis(10),
        outbound: FaultConfig::drop_only(0.3),
        seed: Some(0x5eed),
        ..SenderConfig::default()
    };
    let (delivery, stats) = transfer(payload.clone(), cfg, ReceiverConfig::default()).await;
    assert_eq!(delivery.payload, payload);
    assert_eq!(stats.frames, 51);
    assert!(stats.timeouts > 0, "30% loss should force at least one timeout");
    assert!(stats.timeouts <= 500, "took {} timer rounds", stats.timeouts);
}

// ---------------------------------------------------------------------------
// Test 5: corruption in every direction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_corruption_on_both_ends() {
    let payload = pattern(4096);
    let noisy = FaultConfig {
        checksum: 0.15,
        sequence: 0.05,
        drop: 0.1,
    };
    let sender_cfg = SenderConfig {
        packet_size: 256,
        outbound: noisy,
        inbound: noisy,
        seed: Some(1),
        ..fast_sender()
    };
    let receiver_cfg = ReceiverConfig {
        inbound: noisy,
        outbound: noisy,
        seed: Some(2),
        ..ReceiverConfig::default()
    };
    let (delivery, stats) = transfer(payload.clone(), sender_cfg, receiver_cfg).await;
    assert_eq!(delivery.payload, payload);
    assert!(stats.retransmissions > 0);
}

#[tokio::test]
async fn test_corrupted_acks_only_delay_delivery() {
    let payload = pattern(2000);
    let receiver_cfg = ReceiverConfig {
        outbound: FaultConfig {
            checksum: 0.4,
            ..FaultConfig::NONE
        },
        seed: Some(9),
        ..ReceiverConfig::default()
    };
    let cfg = SenderConfig {
        packet_size: 100,
        ..fast_sender()
    };
    let (delivery, stats) = transfer(payload.clone(), cfg, receiver_cfg).await;
    assert_eq!(delivery.payload, payload);
    assert!(stats.invalid_acks > 0);
}

// ---------------------------------------------------------------------------
// Test 6: fatal conditions surface as errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_invalid_probability_rejected_at_construction() {
    let cfg = SenderConfig {
        outbound: FaultConfig::drop_only(1.0),
        ..SenderConfig::default()
    };
    let dest: SocketAddr = "127.0.0.1:9".parse().unwrap();
    let err = SenderEngine::new(ephemeral().await, dest, cfg).unwrap_err();
    assert!(matches!(err, Error::InvalidProbability(p) if p == 1.0));

    let cfg = ReceiverConfig {
        inbound: FaultConfig::drop_only(2.0),
        ..ReceiverConfig::default()
    };
    assert!(matches!(
        ReceiverEngine::new(ephemeral().await, cfg),
        Err(Error::InvalidProbability(_))
    ));
}

#[tokio::test]
async fn test_invalid_destination_aborts() {
    // Port 0 is not a valid UDP destination.
    let dest: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut tx = SenderEngine::new(ephemeral().await, dest, fast_sender()).unwrap();
    let err = tx.send(b"nowhere").await.unwrap_err();
    assert!(matches!(err, Error::TransportFailure(_)), "got {err:?}");
}

#[tokio::test]
async fn test_silent_peer_exhausts_retries() {
    // Bound but never read: datagrams vanish without an ICMP error.
    let silent = ephemeral().await;
    let cfg = SenderConfig {
        timeout: Duration::from_millis(5),
        max_retries: 4,
        ..SenderConfig::default()
    };
    let mut tx = SenderEngine::new(ephemeral().await, silent.local_addr, cfg).unwrap();
    let err = tx.send(&pattern(300)).await.unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted(4)), "got {err:?}");
    drop(silent);
}

// ---------------------------------------------------------------------------
// Test 7: convenience entry points
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_bytes_and_receive_bytes() {
    // Pick a free port, then release it for receive_bytes to bind.
    let probe = ephemeral().await;
    let addr = probe.local_addr;
    drop(probe);

    let receiver = tokio::spawn(gbn_transfer::receiver::receive_bytes(
        addr,
        ReceiverConfig::default(),
    ));
    // Give the receiver a moment to bind; early frames are retransmitted anyway.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let payload = pattern(3000);
    let stats = gbn_transfer::sender::send_bytes(addr, &payload, fast_sender())
        .await
        .expect("send_bytes");
    let delivery = receiver.await.unwrap().expect("receive_bytes");
    assert_eq!(delivery.payload, payload);
    assert_eq!(stats.frames, 3);
}

// ---------------------------------------------------------------------------
// Test 8: an ack queued when the timer fires still cancels retransmission
// ---------------------------------------------------------------------------

// Runs on the current-thread runtime: the peer blocks the only worker past
// the deadline, so the ack and the timer become ready in the same poll.
#[tokio::test]
async fn test_ack_racing_timer_cancels_retransmission() {
    for trial in 0..16 {
        let mut peer = ephemeral().await;
        let cfg = SenderConfig {
            timeout: Duration::from_millis(20),
            ..SenderConfig::default()
        };
        let mut tx = SenderEngine::new(ephemeral().await, peer.local_addr, cfg).unwrap();
        let sender_addr = tx.local_addr();

        let fake_receiver = tokio::spawn(async move {
            let mut last = None;
            for _ in 0..2 {
                let (bytes, _) = peer.recv_from().await.unwrap();
                last = Some(frame::decode(&bytes).unwrap());
            }
            let ack = Ack::for_frame(&last.unwrap());
            peer.send_to(&ack.encode(), sender_addr).await.unwrap();
            std::thread::sleep(Duration::from_millis(40));
            peer
        });

        let stats = tx.send(b"ten bytes!").await.expect("send failed");
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.retransmissions, 0, "trial {trial} resent acknowledged frames");
        drop(fake_receiver.await.unwrap());
    }
}

// ---------------------------------------------------------------------------
// Test 9: a bound session ignores third parties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_receiver_ignores_frames_from_other_peers() {
    let payload = pattern(200);
    let frames = frame::encode(&payload, 100).unwrap();
    let mut rx = ReceiverEngine::new(ephemeral().await, ReceiverConfig::default()).unwrap();
    let rx_addr = rx.local_addr();
    let receiver = tokio::spawn(async move { rx.receive().await });

    let mut legit = ephemeral().await;
    let mut intruder = ephemeral().await;

    legit.send_to(&frames[0].encode(), rx_addr).await.unwrap();
    let (reply, _) = legit.recv_from().await.unwrap();
    assert_eq!(Ack::decode(&reply), Ok(Ack::for_frame(&frames[0])));

    // Well-formed and in order, but from the wrong address.
    let forged = Frame::new(1, b"forged".to_vec());
    intruder.send_to(&forged.encode(), rx_addr).await.unwrap();
    for f in &frames[1..] {
        legit.send_to(&f.encode(), rx_addr).await.unwrap();
    }

    let delivery = receiver.await.unwrap().expect("receiver failed");
    assert_eq!(delivery.payload, payload);
    assert_eq!(delivery.peer, legit.local_addr);

    let answered = tokio::time::timeout(Duration::from_millis(100), intruder.recv_from()).await;
    assert!(answered.is_err(), "intruder got a reply: {answered:?}");
}

#[tokio::test]
async fn test_sender_ignores_replies_from_other_peers() {
    let silent = ephemeral().await;
    let payload = pattern(300);
    let frames = frame::encode(&payload, 2048).unwrap();
    let cfg = SenderConfig {
        timeout: Duration::from_millis(20),
        max_retries: 4,
        ..SenderConfig::default()
    };
    let mut tx = SenderEngine::new(ephemeral().await, silent.local_addr, cfg).unwrap();
    let sender_addr = tx.local_addr();

    // A valid final ack and TERMINATE, both from the wrong address.
    let intruder = ephemeral().await;
    let spoof = tokio::spawn(async move {
        let ack = Ack::for_frame(&frames[frames.len() - 1]).encode();
        for _ in 0..5 {
            intruder.send_to(&ack, sender_addr).await.unwrap();
            intruder.send_to(TERMINATE, sender_addr).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let err = tx.send(&payload).await.unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted(4)), "got {err:?}");
    spoof.await.unwrap();
    drop(silent);
}
