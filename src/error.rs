//! # Error Types
//!
//! Error handling for the UDP transport engine.
//!
//! This module defines every failure the crate can report, from codec bounds
//! violations to socket and lifecycle errors.
//!
//! ## Error Categories
//! - **Codec Errors**: out-of-bounds writes/reads, undersized header buffers
//! - **Pool Errors**: invalid buffer lengths
//! - **Endpoint Errors**: unsupported address families, unroutable ports
//! - **Engine Errors**: lifecycle misuse, connection limits, socket failures
//! - **Configuration Errors**: unparseable or inconsistent settings
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use udp_transport::core::header::PacketHeader;
//! use udp_transport::error::{Result, TransportError};
//!
//! fn peek_header(bytes: &[u8]) -> Result<PacketHeader> {
//!     PacketHeader::read_from(bytes)
//! }
//!
//! match peek_header(&[0u8; 4]) {
//!     Ok(header) => println!("datagram from {}", header.source_endpoint()),
//!     Err(TransportError::TooShort { expected, actual }) => {
//!         eprintln!("need {expected} bytes, got {actual}");
//!     }
//!     Err(other) => eprintln!("decode failed: {other}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Static strings used when reporting lifecycle errors.
/// Borrowed constants keep the hot paths free of per-error allocations.
pub mod constants {
    /// Expected-state phrasing for operations requiring a fresh engine.
    pub const EXPECT_UNBOUND: &str = "unbound";
    /// Expected-state phrasing for operations requiring a bound socket.
    pub const EXPECT_BOUND: &str = "bound";
    /// Expected-state phrasing for operations allowed once bound.
    pub const EXPECT_BOUND_OR_RUNNING: &str = "bound or running";
    /// Expected-state phrasing for operations allowed until disposal.
    pub const EXPECT_NOT_CLOSED: &str = "unbound, bound, or running";
}

// TransportError is the primary error type for all transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("requested buffer length is invalid: {0}")]
    InvalidLength(usize),

    #[error("buffer access out of bounds: index {index} on a {len} byte buffer")]
    OutOfBounds { index: usize, len: usize },

    #[error("buffer too short for a packet header: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("failed to decode packet header")]
    HeaderDecode(#[source] Box<TransportError>),

    #[error("only IPv4 endpoints are supported")]
    UnsupportedAddressFamily,

    #[error("port {0} is outside the routable range")]
    PortOutOfRange(u16),

    #[error("socket failure: {0}")]
    SocketFailure(#[from] io::Error),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("invalid engine state: {found} (expected {expected})")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error("connection table is full ({0} peers)")]
    ConnectionLimit(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Wraps a codec failure that surfaced while decoding or encoding a
    /// packet header, preserving the original cause.
    pub fn header_decode(cause: TransportError) -> Self {
        TransportError::HeaderDecode(Box::new(cause))
    }
}

/// Type alias for Results using TransportError
pub type Result<T> = std::result::Result<T, TransportError>;
