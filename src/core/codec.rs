//! # Byte Codec
//!
//! Offset-based encoding of fixed-width values into byte slices.
//!
//! Every operation validates its bounds before touching the slice and
//! returns the index of the first byte after the field, so header fields can
//! be chained without manual offset arithmetic. Integers are little-endian;
//! IPv4 addresses are their four octets in natural order. This byte order is
//! part of the wire contract and must stay bit-exact.

use std::net::Ipv4Addr;

use crate::error::{Result, TransportError};

/// Width in bytes of every field this codec handles.
pub const FIELD_LEN: usize = 4;

/// Fails with `OutOfBounds` unless a full field fits at `index`.
fn check_bounds(len: usize, index: usize) -> Result<()> {
    match index.checked_add(FIELD_LEN) {
        Some(end) if end <= len => Ok(()),
        _ => Err(TransportError::OutOfBounds { index, len }),
    }
}

/// Writes `value` little-endian at `index`, returning the next free index.
pub fn write_u32(buf: &mut [u8], index: usize, value: u32) -> Result<usize> {
    check_bounds(buf.len(), index)?;
    buf[index..index + FIELD_LEN].copy_from_slice(&value.to_le_bytes());
    Ok(index + FIELD_LEN)
}

/// Reads a little-endian u32 at `index`, returning the value and next index.
pub fn read_u32(buf: &[u8], index: usize) -> Result<(u32, usize)> {
    check_bounds(buf.len(), index)?;
    let value = u32::from_le_bytes([
        buf[index],
        buf[index + 1],
        buf[index + 2],
        buf[index + 3],
    ]);
    Ok((value, index + FIELD_LEN))
}

/// Writes the four octets of `addr` at `index`, returning the next index.
pub fn write_ipv4(buf: &mut [u8], index: usize, addr: Ipv4Addr) -> Result<usize> {
    check_bounds(buf.len(), index)?;
    buf[index..index + FIELD_LEN].copy_from_slice(&addr.octets());
    Ok(index + FIELD_LEN)
}

/// Reads an IPv4 address at `index`, returning the address and next index.
pub fn read_ipv4(buf: &[u8], index: usize) -> Result<(Ipv4Addr, usize)> {
    check_bounds(buf.len(), index)?;
    let addr = Ipv4Addr::new(
        buf[index],
        buf[index + 1],
        buf[index + 2],
        buf[index + 3],
    );
    Ok((addr, index + FIELD_LEN))
}
