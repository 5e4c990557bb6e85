//! # Packet Header
//!
//! The fixed 17-byte header that starts every datagram.
//!
//! ## Layout
//! ```text
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 4    | source IPv4    |
//! | 4      | 4    | source port    |
//! | 8      | 4    | dest IPv4      |
//! | 12     | 4    | dest port      |
//! | 16     | 1    | request kind   |
//! ```
//!
//! Ports occupy four little-endian bytes on the wire but are `u16` in the
//! API. The request byte is decoded permissively: unknown values collapse to
//! [`ConnectionRequest::StayConnected`] so a malformed datagram degrades into
//! ordinary traffic instead of an error.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::core::codec;
use crate::error::{Result, TransportError};

/// Size in bytes of the encoded header. The first `HEADER_LEN` bytes of
/// every buffer are reserved for it.
pub const HEADER_LEN: usize = 17;

/// Connection intent carried in the final header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionRequest {
    /// Ordinary traffic between peers that consider themselves connected.
    #[default]
    StayConnected,
    /// Ask the receiver to start tracking the sender.
    Connect,
    /// Tell the receiver to stop tracking the sender.
    Disconnect,
}

impl ConnectionRequest {
    /// Wire value of this request kind.
    pub fn as_u8(self) -> u8 {
        match self {
            ConnectionRequest::StayConnected => 0,
            ConnectionRequest::Connect => 1,
            ConnectionRequest::Disconnect => 2,
        }
    }

    /// Decodes a wire byte. Unknown values fall back to `StayConnected`.
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            1 => ConnectionRequest::Connect,
            2 => ConnectionRequest::Disconnect,
            _ => ConnectionRequest::StayConnected,
        }
    }
}

/// Source/destination addressing plus the connection request for one
/// datagram. A plain value type; the engine stamps one of these into the
/// header region of every outbound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub source_address: Ipv4Addr,
    pub source_port: u16,
    pub dest_address: Ipv4Addr,
    pub dest_port: u16,
    pub request: ConnectionRequest,
}

impl PacketHeader {
    /// Builds a header describing traffic from `source` to `dest`.
    pub fn new(source: SocketAddrV4, dest: SocketAddrV4, request: ConnectionRequest) -> Self {
        Self {
            source_address: *source.ip(),
            source_port: source.port(),
            dest_address: *dest.ip(),
            dest_port: dest.port(),
            request,
        }
    }

    /// Decodes a header from the start of `buf`.
    ///
    /// Fails with [`TransportError::TooShort`] when the buffer cannot hold a
    /// full header; codec failures are wrapped in
    /// [`TransportError::HeaderDecode`] with the cause attached.
    pub fn read_from(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(TransportError::TooShort {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }
        let (source_address, index) =
            codec::read_ipv4(buf, 0).map_err(TransportError::header_decode)?;
        let (source_port, index) =
            codec::read_u32(buf, index).map_err(TransportError::header_decode)?;
        let (dest_address, index) =
            codec::read_ipv4(buf, index).map_err(TransportError::header_decode)?;
        let (dest_port, index) =
            codec::read_u32(buf, index).map_err(TransportError::header_decode)?;
        let request = ConnectionRequest::from_u8(buf[index]);
        Ok(Self {
            source_address,
            source_port: source_port as u16,
            dest_address,
            dest_port: dest_port as u16,
            request,
        })
    }

    /// Encodes the header into the start of `buf`. Same length precondition
    /// as [`PacketHeader::read_from`].
    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_LEN {
            return Err(TransportError::TooShort {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }
        let index = codec::write_ipv4(buf, 0, self.source_address)
            .map_err(TransportError::header_decode)?;
        let index = codec::write_u32(buf, index, u32::from(self.source_port))
            .map_err(TransportError::header_decode)?;
        let index = codec::write_ipv4(buf, index, self.dest_address)
            .map_err(TransportError::header_decode)?;
        let index = codec::write_u32(buf, index, u32::from(self.dest_port))
            .map_err(TransportError::header_decode)?;
        buf[index] = self.request.as_u8();
        Ok(())
    }

    /// Exchanges source and destination, turning an inbound "who is this"
    /// header into an outbound "replying to the sender" header.
    pub fn swap_endpoints(&mut self) {
        std::mem::swap(&mut self.source_address, &mut self.dest_address);
        std::mem::swap(&mut self.source_port, &mut self.dest_port);
    }

    /// Replaces the request kind, leaving the endpoints untouched.
    pub fn set_request(&mut self, request: ConnectionRequest) {
        self.request = request;
    }

    /// The sender's endpoint as seen in this header.
    pub fn source_endpoint(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.source_address, self.source_port)
    }

    /// The receiver's endpoint as seen in this header.
    pub fn dest_endpoint(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.dest_address, self.dest_port)
    }
}
