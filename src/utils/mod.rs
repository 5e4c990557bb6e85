//! # Utility Modules
//!
//! Supporting utilities for buffer reuse, logging, and observability.
//!
//! This module provides reusable pieces the transport engine builds on.
//!
//! ## Components
//! - **Buffer Pool**: exact-length buckets of reusable packet buffers
//! - **Logging**: the narrow logging capability and its default sinks
//! - **Metrics**: thread-safe observability counters

pub mod buffer_pool;
pub mod logging;
pub mod metrics;

// Re-export public types for advanced users
pub use buffer_pool::{BufferPool, PacketBuffer, PoolStats, Poolable};
pub use logging::{NullLogger, TracingLogger, TransportLogger};
pub use metrics::{Metrics, MetricsSnapshot};
