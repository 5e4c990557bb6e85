//! Observability and Metrics
//!
//! This module provides metrics collection for monitoring transport
//! throughput and health. One `Metrics` instance belongs to one engine;
//! share the `Arc` handle to observe a running transport.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Traffic and lifecycle counters for one transport engine
#[derive(Debug)]
pub struct Metrics {
    /// Datagrams pulled off the socket
    pub datagrams_received: AtomicU64,
    /// Datagrams that passed validation and reached the inbound queue
    pub datagrams_delivered: AtomicU64,
    /// Datagrams rejected by validation
    pub datagrams_rejected: AtomicU64,
    /// Datagrams written to the socket (fan-out counts each transmit)
    pub datagrams_sent: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Socket receive failures
    pub recv_errors: AtomicU64,
    /// Socket send failures
    pub send_errors: AtomicU64,
    /// Connections added, locally or via inbound connect
    pub connections_opened: AtomicU64,
    /// Connections removed via disconnect handling
    pub connections_closed: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            datagrams_delivered: AtomicU64::new(0),
            datagrams_rejected: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram read from the socket
    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram delivered to the inbound queue
    pub fn datagram_delivered(&self) {
        self.datagrams_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram rejected by validation
    pub fn datagram_rejected(&self) {
        self.datagrams_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram written to the socket
    pub fn datagram_sent(&self, byte_count: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a socket receive failure
    pub fn recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a socket send failure
    pub fn send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection entering the table
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection leaving the table
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_delivered: self.datagrams_delivered.load(Ordering::Relaxed),
            datagrams_rejected: self.datagrams_rejected.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            datagrams_received = snapshot.datagrams_received,
            datagrams_delivered = snapshot.datagrams_delivered,
            datagrams_rejected = snapshot.datagrams_rejected,
            datagrams_sent = snapshot.datagrams_sent,
            bytes_received = snapshot.bytes_received,
            bytes_sent = snapshot.bytes_sent,
            recv_errors = snapshot.recv_errors,
            send_errors = snapshot.send_errors,
            connections_opened = snapshot.connections_opened,
            connections_closed = snapshot.connections_closed,
            uptime_seconds = snapshot.uptime_seconds,
            "Transport metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub datagrams_delivered: u64,
    pub datagrams_rejected: u64,
    pub datagrams_sent: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub recv_errors: u64,
    pub send_errors: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub uptime_seconds: u64,
}
