//! # Core Wire Components
//!
//! Low-level byte encoding and the fixed packet header.
//!
//! This module owns the wire contract: every datagram starts with a 17-byte
//! header laid out at fixed offsets, encoded through the offset-based codec.
//!
//! ## Components
//! - **Codec**: bounds-checked little-endian integer and IPv4 encoding
//! - **Header**: the 17-byte source/destination/request header
//!
//! ## Wire Format
//! ```text
//! [SrcAddr(4)] [SrcPort(4)] [DstAddr(4)] [DstPort(4)] [Request(1)] [Payload(N)]
//! ```
//!
//! Ports travel as 32-bit little-endian values even though the API exposes
//! them as `u16`; the layout is bit-exact and shared with every peer.

pub mod codec;
pub mod header;
