//! End-to-end tests running two or more engines against each other over
//! 127.0.0.1 with ephemeral ports.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use udp_transport::{
    BufferPool, ConnectionRequest, ConnectionState, NullLogger, PacketBuffer, PacketHeader,
    TransportConfig, TransportEngine, HEADER_LEN,
};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEADLINE: Duration = Duration::from_secs(5);

/// Builds, binds, and runs an engine on an ephemeral loopback port,
/// returning it together with its buffer pool.
async fn started_engine() -> (TransportEngine, Arc<BufferPool<PacketBuffer>>) {
    let pool = Arc::new(BufferPool::new());
    let config = TransportConfig::default_with_overrides(|c| {
        c.bind_address = "127.0.0.1:0".to_string();
    });
    let addr = config.bind_addr().expect("Loopback address should parse");
    let engine = TransportEngine::new(config, Arc::clone(&pool), Arc::new(NullLogger))
        .expect("Engine should build from a valid config");
    engine
        .bind(addr)
        .await
        .expect("Binding an ephemeral loopback port should succeed");
    engine.run().expect("Run should spawn the background tasks");
    (engine, pool)
}

/// Polls `probe` until it returns true, panicking after the deadline.
async fn eventually<F>(what: &str, mut probe: F)
where
    F: FnMut() -> bool,
{
    let waited = tokio::time::timeout(DEADLINE, async {
        while !probe() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

/// Polls the inbound queue until a datagram arrives.
async fn receive_one(engine: &TransportEngine, what: &str) -> PacketBuffer {
    tokio::time::timeout(DEADLINE, async {
        loop {
            if let Some(buffer) = engine.try_receive() {
                return buffer;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connect_tracks_peer_without_delivering_handshake() {
    let (alice, _alice_pool) = started_engine().await;
    let (bob, _bob_pool) = started_engine().await;
    let alice_addr = alice.local_addr().expect("Alice should be bound");
    let bob_addr = bob.local_addr().expect("Bob should be bound");

    alice
        .add_connection(SocketAddr::V4(bob_addr))
        .expect("Connect should queue");

    // The caller tracks the peer immediately, before any reply.
    assert_eq!(alice.connection_count(), 1);
    let mine = alice.connections()[0];
    assert_eq!(mine.remote_endpoint(), bob_addr);
    assert_eq!(mine.state, ConnectionState::Connected);

    eventually("the connect request to register at the peer", || {
        bob.connection_count() == 1
    })
    .await;
    let theirs = bob.connections()[0];
    assert_eq!(theirs.remote_endpoint(), alice_addr);
    assert_eq!(theirs.state, ConnectionState::Connected);
    assert_eq!(theirs.header.request, ConnectionRequest::StayConnected);

    // The handshake datagram never surfaces to the application.
    eventually("the handshake to be consumed", || {
        let counters = bob.metrics().snapshot();
        counters.datagrams_rejected == 1 && counters.connections_opened == 1
    })
    .await;
    assert!(bob.try_receive().is_none());

    alice.dispose().await.expect("Dispose should succeed");
    bob.dispose().await.expect("Dispose should succeed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_payload_flows_after_handshake() {
    let (alice, alice_pool) = started_engine().await;
    let (bob, bob_pool) = started_engine().await;
    let alice_addr = alice.local_addr().expect("Alice should be bound");
    let bob_addr = bob.local_addr().expect("Bob should be bound");

    alice
        .add_connection(SocketAddr::V4(bob_addr))
        .expect("Connect should queue");
    eventually("the handshake to complete", || bob.connection_count() == 1).await;

    let mut buffer = alice_pool
        .acquire(alice.config().mtu)
        .expect("Acquire should succeed");
    buffer.write_payload(b"ping").expect("Payload should fit");
    alice.enqueue_send(buffer).expect("Enqueue should succeed");

    let received = receive_one(&bob, "the ping datagram").await;
    assert_eq!(received.payload(), HEADER_LEN + 4);
    assert_eq!(received.payload_slice(), b"ping");

    // The send task stamped Alice's connection header onto the datagram.
    let header = PacketHeader::read_from(received.as_slice()).expect("Header should decode");
    assert_eq!(header.source_endpoint(), alice_addr);
    assert_eq!(header.dest_endpoint(), bob_addr);
    assert_eq!(header.request, ConnectionRequest::StayConnected);
    bob_pool.release(received);

    let expected_bytes = (HEADER_LEN + HEADER_LEN + 4) as u64; // connect + ping
    eventually("send counters to settle", || {
        let counters = alice.metrics().snapshot();
        counters.datagrams_sent == 2 && counters.bytes_sent == expected_bytes
    })
    .await;
    assert_eq!(bob.metrics().snapshot().datagrams_delivered, 1);

    alice.dispose().await.expect("Dispose should succeed");
    bob.dispose().await.expect("Dispose should succeed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disconnect_evicts_sender_without_delivery() {
    let (alice, _alice_pool) = started_engine().await;
    let (bob, bob_pool) = started_engine().await;
    let alice_addr = alice.local_addr().expect("Alice should be bound");
    let bob_addr = bob.local_addr().expect("Bob should be bound");

    alice
        .add_connection(SocketAddr::V4(bob_addr))
        .expect("Connect should queue");
    eventually("the handshake to complete", || bob.connection_count() == 1).await;
    assert_eq!(alice.connection_count(), 1);

    // Bob tells Alice to stop tracking him. The header is pre-stamped so
    // the send task transmits it unchanged.
    let goodbye = PacketHeader::new(bob_addr, alice_addr, ConnectionRequest::Disconnect);
    let mut buffer = bob_pool.acquire(HEADER_LEN).expect("Acquire should succeed");
    goodbye
        .write_to(buffer.as_mut_slice())
        .expect("Header should encode");
    bob.enqueue_send_stamped(buffer).expect("Enqueue should succeed");

    eventually("the disconnect to evict the sender", || {
        alice.connection_count() == 0 && alice.metrics().snapshot().connections_closed == 1
    })
    .await;
    assert!(alice.try_receive().is_none());

    alice.dispose().await.expect("Dispose should succeed");
    bob.dispose().await.expect("Dispose should succeed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcast_reaches_every_tracked_connection() {
    let (server, server_pool) = started_engine().await;
    let (first, first_pool) = started_engine().await;
    let (second, second_pool) = started_engine().await;
    let server_addr = server.local_addr().expect("Server should be bound");
    let first_addr = first.local_addr().expect("First client should be bound");
    let second_addr = second.local_addr().expect("Second client should be bound");

    first
        .add_connection(SocketAddr::V4(server_addr))
        .expect("Connect should queue");
    second
        .add_connection(SocketAddr::V4(server_addr))
        .expect("Connect should queue");
    eventually("both clients to register", || server.connection_count() == 2).await;

    let mut buffer = server_pool
        .acquire(server.config().mtu)
        .expect("Acquire should succeed");
    buffer.write_payload(b"fanout").expect("Payload should fit");
    server.enqueue_send(buffer).expect("Enqueue should succeed");

    let at_first = receive_one(&first, "the broadcast at the first client").await;
    let at_second = receive_one(&second, "the broadcast at the second client").await;
    assert_eq!(at_first.payload_slice(), b"fanout");
    assert_eq!(at_second.payload_slice(), b"fanout");

    // Each copy was stamped with its own connection's header.
    let first_header = PacketHeader::read_from(at_first.as_slice()).expect("Header should decode");
    assert_eq!(first_header.source_endpoint(), server_addr);
    assert_eq!(first_header.dest_endpoint(), first_addr);
    let second_header =
        PacketHeader::read_from(at_second.as_slice()).expect("Header should decode");
    assert_eq!(second_header.source_endpoint(), server_addr);
    assert_eq!(second_header.dest_endpoint(), second_addr);

    first_pool.release(at_first);
    second_pool.release(at_second);

    // The connect handshakes themselves were consumed by the server.
    assert!(server.try_receive().is_none());

    server.dispose().await.expect("Dispose should succeed");
    first.dispose().await.expect("Dispose should succeed");
    second.dispose().await.expect("Dispose should succeed");
}
