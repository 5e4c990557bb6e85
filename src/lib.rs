//! # udp-transport
//!
//! Allocation-conscious UDP transport with pooled buffers and a lightweight
//! connect/disconnect handshake, for real-time applications such as
//! authoritative game servers.
//!
//! The engine owns one socket and two background tasks. Every datagram
//! travels in a pooled fixed-capacity buffer whose first 17 bytes hold a
//! binary header (source endpoint, destination endpoint, request kind); a
//! connection table tracks remote peers and drives a tiny handshake with no
//! acknowledgement, retransmission, or ordering beyond what UDP provides.
//!
//! # Architecture
//!
//! ```text
//!  application
//!      │ acquire / release            try_receive
//!      ▼                                   ▲
//!  ┌────────────┐  enqueue_send  ┌─────────┴─────────┐
//!  │ BufferPool │───────────────▶│  TransportEngine  │
//!  └────────────┘                │  ┌─────────────┐  │
//!      ▲      ▲                  │  │ send task   │──┼──▶ fan-out per
//!      │      │                  │  ├─────────────┤  │    connection
//!      │      └──────────────────┼──│ recv task   │◀─┼──── UDP socket
//!      │        release rejects  │  └─────────────┘  │
//!      │                         │  ConnectionTable  │
//!      └─────────────────────────┴───────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`mod@core`]: the byte codec and the 17-byte packet header
//! - [`protocol`]: connection records and the thread-safe table
//! - [`transport`]: the engine, its background tasks, and validation
//! - [`utils`]: buffer pool, logging capability, metrics
//! - [`config`]: engine settings with TOML/env loading
//! - [`error`]: the crate-wide error type
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use udp_transport::{
//!     BufferPool, PacketBuffer, TracingLogger, TransportConfig, TransportEngine,
//! };
//!
//! # async fn demo() -> udp_transport::Result<()> {
//! let pool: Arc<BufferPool<PacketBuffer>> = Arc::new(BufferPool::new());
//! let config = TransportConfig::default();
//! let engine = TransportEngine::new(config.clone(), Arc::clone(&pool), Arc::new(TracingLogger))?;
//!
//! engine.bind(config.bind_addr()?).await?;
//! engine.run()?;
//! engine.add_connection("127.0.0.1:9001".parse().map_err(|e| {
//!     udp_transport::TransportError::Config(format!("bad peer address: {e}"))
//! })?)?;
//!
//! let mut buffer = pool.acquire(config.mtu)?;
//! buffer.write_payload(b"ping")?;
//! engine.enqueue_send(buffer)?;
//!
//! if let Some(received) = engine.try_receive() {
//!     println!("got {} payload bytes", received.payload_slice().len());
//!     pool.release(received);
//! }
//!
//! engine.dispose().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::config::TransportConfig;
pub use crate::core::header::{ConnectionRequest, PacketHeader, HEADER_LEN};
pub use crate::error::{Result, TransportError};
pub use crate::protocol::connection::{Connection, ConnectionState, ConnectionTable};
pub use crate::transport::udp::TransportEngine;
pub use crate::utils::buffer_pool::{BufferPool, PacketBuffer, PoolStats, Poolable};
pub use crate::utils::logging::{NullLogger, TracingLogger, TransportLogger};
pub use crate::utils::metrics::{Metrics, MetricsSnapshot};
