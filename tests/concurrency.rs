use udp_transport::{
    BufferPool, Connection, ConnectionRequest, ConnectionState, ConnectionTable, NullLogger,
    PacketBuffer, PacketHeader, TransportConfig, TransportEngine,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_pool_hammering() {
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let pool: Arc<BufferPool<PacketBuffer>> = Arc::new(BufferPool::new());
    let task_count = 8usize;
    let iterations = 2_000usize;
    let lengths = [64usize, 256, 1024];

    let mut tasks = JoinSet::new();
    for task_id in 0..task_count {
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            for i in 0..iterations {
                let length = lengths[(task_id + i) % lengths.len()];
                let mut buffer = pool.acquire(length).unwrap();
                buffer.write_payload(&[(i & 0xFF) as u8; 16]).unwrap();
                pool.release(buffer);
            }
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    let stats = pool.stats();
    assert_eq!(
        stats.allocated + stats.reused,
        (task_count * iterations) as u64
    );
    // Every buffer the pool ever created ends up parked idle again.
    assert_eq!(stats.idle as u64, stats.allocated);

    // Recycled buffers come back zeroed.
    let buffer = pool.acquire(64).unwrap();
    assert!(buffer.as_slice().iter().all(|&b| b == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_table_mutation_with_snapshots() {
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let table = Arc::new(ConnectionTable::new(1024));
    let writers = 4usize;
    let per_writer = 200usize;

    let mut tasks = JoinSet::new();
    for writer in 0..writers {
        let table = Arc::clone(&table);
        tasks.spawn(async move {
            let local = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 9000);
            for i in 0..per_writer {
                let port = (10_000 + writer * per_writer + i) as u16;
                let remote = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port);
                let header = PacketHeader::new(local, remote, ConnectionRequest::StayConnected);
                table
                    .insert(Connection::new(header, ConnectionState::Connected))
                    .unwrap();
                if i % 2 == 0 {
                    table.remove_by_remote(&remote);
                }
            }
        });
    }
    let reader_table = Arc::clone(&table);
    tasks.spawn(async move {
        for _ in 0..500 {
            for connection in reader_table.snapshot() {
                // Snapshots only ever observe fully formed entries.
                assert_eq!(connection.state, ConnectionState::Connected);
                assert_eq!(
                    *connection.remote_endpoint().ip(),
                    Ipv4Addr::new(127, 0, 0, 1)
                );
            }
            tokio::task::yield_now().await;
        }
    });
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    // Each writer kept the odd-indexed half of its entries.
    assert_eq!(table.len(), writers * per_writer / 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_senders_share_one_engine() {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::JoinSet;

    let pool: Arc<BufferPool<PacketBuffer>> = Arc::new(BufferPool::new());
    let config = TransportConfig::default_with_overrides(|c| {
        c.bind_address = "127.0.0.1:0".to_string();
    });
    let engine =
        Arc::new(TransportEngine::new(config, Arc::clone(&pool), Arc::new(NullLogger)).unwrap());
    engine.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    engine.run().unwrap();

    // A raw peer gives the fan-out a destination without a second engine.
    let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    engine.add_connection(peer.local_addr().unwrap()).unwrap();

    let senders = 8usize;
    let per_sender = 50usize;
    let mut tasks = JoinSet::new();
    for sender in 0..senders {
        let engine = Arc::clone(&engine);
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            for i in 0..per_sender {
                let mut buffer = pool.acquire(1024).unwrap();
                buffer
                    .write_payload(format!("{sender}:{i}").as_bytes())
                    .unwrap();
                engine.enqueue_send(buffer).unwrap();
            }
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    // One connect datagram plus every queued payload.
    let expected = (senders * per_sender + 1) as u64;
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.metrics().snapshot().datagrams_sent < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all queued datagrams should be transmitted");
    assert_eq!(engine.metrics().snapshot().datagrams_sent, expected);

    engine.dispose().await.unwrap();

    // With both tasks joined, every buffer ever acquired is idle again.
    let stats = pool.stats();
    assert_eq!(stats.idle as u64, stats.allocated);
}
