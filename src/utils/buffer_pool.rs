//! # Buffer Pool
//!
//! Reusable fixed-capacity packet buffers, bucketed by exact length.
//!
//! The transport acquires one buffer per datagram; pooling keeps the steady
//! state allocation-free once every bucket is warm. Buckets never best-fit:
//! a request for 1024 bytes is served only by 1024-byte buffers, trading a
//! little memory for O(1) lookup and no fragmentation bookkeeping.
//!
//! Ownership of an acquired buffer moves to the caller until it is released,
//! so a buffer is always either idle in a bucket, checked out, or in flight
//! inside a queue. Double-release is a compile error, not a runtime check.
//!
//! ## Usage
//! ```rust
//! use udp_transport::utils::buffer_pool::{BufferPool, PacketBuffer};
//!
//! let pool: BufferPool<PacketBuffer> = BufferPool::new();
//! let mut buffer = pool.acquire(256).unwrap();
//! buffer.write_payload(b"hello").unwrap();
//! pool.release(buffer);
//! assert_eq!(pool.idle_count(), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::core::header::HEADER_LEN;
use crate::error::{Result, TransportError};

/// Contract a resource must satisfy to live in a [`BufferPool`].
pub trait Poolable {
    /// Creates a fresh resource with the given capacity.
    fn init(length: usize) -> Self;
    /// Clears the resource for reuse.
    fn recycle(&mut self);
    /// Capacity of the resource, used as its bucket key.
    fn length(&self) -> usize;
}

/// A fixed-capacity byte buffer with two cursors.
///
/// `offset` is the write/read position and starts just past the header
/// region (clamped to the capacity for runt buffers); `payload` tracks the
/// logical content length. On the receive side `payload` is the total
/// datagram length, header included; on the send side it counts the bytes
/// the application appended after the header region.
#[derive(Debug)]
pub struct PacketBuffer {
    data: Vec<u8>,
    offset: usize,
    payload: usize,
}

impl PacketBuffer {
    /// Total capacity in bytes. Fixed for the lifetime of the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current write/read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Logical content length.
    pub fn payload(&self) -> usize {
        self.payload
    }

    /// Records the logical content length without moving `offset`. The
    /// receive path uses this to note how many bytes a datagram carried.
    pub fn set_payload(&mut self, payload: usize) {
        self.payload = payload;
    }

    /// Copies `bytes` at the current offset, advancing both cursors.
    pub fn write_payload(&mut self, bytes: &[u8]) -> Result<()> {
        let end = match self.offset.checked_add(bytes.len()) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                return Err(TransportError::OutOfBounds {
                    index: self.offset,
                    len: self.data.len(),
                })
            }
        };
        self.data[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        self.payload += bytes.len();
        Ok(())
    }

    /// Payload bytes of a received datagram, past the header region. Empty
    /// when the datagram carried nothing beyond its header.
    pub fn payload_slice(&self) -> &[u8] {
        if self.payload <= HEADER_LEN {
            return &[];
        }
        &self.data[HEADER_LEN..self.payload.min(self.data.len())]
    }

    /// Full backing storage, header region included.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable backing storage, header region included.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Poolable for PacketBuffer {
    fn init(length: usize) -> Self {
        Self {
            data: vec![0; length],
            offset: HEADER_LEN.min(length),
            payload: 0,
        }
    }

    fn recycle(&mut self) {
        self.data.fill(0);
        self.offset = HEADER_LEN.min(self.data.len());
        self.payload = 0;
    }

    fn length(&self) -> usize {
        self.data.len()
    }
}

/// Allocation counters for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers created because no idle one matched the requested length.
    pub allocated: u64,
    /// Acquisitions served from a bucket.
    pub reused: u64,
    /// Buffers currently idle across all buckets.
    pub idle: usize,
}

/// Thread-safe pool of poolable resources, bucketed by exact length.
pub struct BufferPool<T> {
    buckets: Mutex<HashMap<usize, VecDeque<T>>>,
    allocated: AtomicU64,
    reused: AtomicU64,
}

impl<T: Poolable> BufferPool<T> {
    /// Creates an empty pool. Buckets appear lazily as lengths are seen.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Hands out an idle resource of exactly `length` bytes, allocating a
    /// fresh one when the bucket is empty. Ownership moves to the caller.
    pub fn acquire(&self, length: usize) -> Result<T> {
        if length == 0 {
            return Err(TransportError::InvalidLength(length));
        }
        let recycled = {
            let mut buckets = self
                .buckets
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            buckets.get_mut(&length).and_then(VecDeque::pop_front)
        };
        match recycled {
            Some(item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                Ok(item)
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Ok(T::init(length))
            }
        }
    }

    /// Recycles `item` and parks it in the bucket keyed by its length.
    pub fn release(&self, mut item: T) {
        item.recycle();
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        buckets.entry(item.length()).or_default().push_back(item);
    }

    /// Number of idle resources across all buckets.
    pub fn idle_count(&self) -> usize {
        let buckets = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        buckets.values().map(VecDeque::len).sum()
    }

    /// Snapshot of the pool's allocation counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.idle_count(),
        }
    }
}

impl<T: Poolable> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
