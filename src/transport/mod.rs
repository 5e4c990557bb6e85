//! # Transport Layer
//!
//! The UDP engine that moves pooled buffers between the application and the
//! socket.
//!
//! ## Components
//! - **Udp**: the [`TransportEngine`](udp::TransportEngine) state machine,
//!   its receive/send tasks, and the inbound validation algorithm

pub mod udp;

pub use udp::TransportEngine;
