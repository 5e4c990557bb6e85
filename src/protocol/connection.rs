//! Connection records and the thread-safe table that tracks them.
//!
//! The table is mutated by the application (explicit adds), the receive
//! task (connect/disconnect detection), and read by the send task (fan-out
//! snapshots). Every access goes through one `RwLock`; snapshots copy the
//! entries out so fan-out iteration never holds the lock across socket
//! writes.

use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::sync::{PoisonError, RwLock};

use crate::core::header::PacketHeader;
use crate::error::{Result, TransportError};

/// Lifecycle of one tracked peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Placeholder state, never stored by the engine itself.
    #[default]
    None,
    /// Peer is believed reachable; traffic fans out to it.
    Connected,
    /// Peer is marked for removal; the next datagram from it evicts the entry.
    Disconnected,
}

/// One tracked remote peer: the header template stamped on outbound
/// datagrams plus the peer's lifecycle state. Identity is the remote
/// endpoint, i.e. the destination fields of the stored header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub header: PacketHeader,
    pub state: ConnectionState,
}

impl Connection {
    pub fn new(header: PacketHeader, state: ConnectionState) -> Self {
        Self { header, state }
    }

    /// The peer's endpoint, which keys this entry in the table.
    pub fn remote_endpoint(&self) -> SocketAddrV4 {
        self.header.dest_endpoint()
    }
}

/// Thread-safe set of connections keyed by remote endpoint, bounded by the
/// configured capacity.
pub struct ConnectionTable {
    entries: RwLock<HashMap<SocketAddrV4, Connection>>,
    capacity: usize,
}

impl ConnectionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Inserts a connection keyed by its remote endpoint. Re-inserting a
    /// tracked peer replaces the entry; a new peer past the capacity bound
    /// fails with [`TransportError::ConnectionLimit`].
    pub fn insert(&self, connection: Connection) -> Result<()> {
        let remote = connection.remote_endpoint();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity && !entries.contains_key(&remote) {
            return Err(TransportError::ConnectionLimit(self.capacity));
        }
        entries.insert(remote, connection);
        Ok(())
    }

    /// Removes and returns the entry for `remote`, if tracked.
    pub fn remove_by_remote(&self, remote: &SocketAddrV4) -> Option<Connection> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(remote)
    }

    /// Copies out the entry for `remote`, if tracked.
    pub fn find_by_remote(&self, remote: &SocketAddrV4) -> Option<Connection> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(remote)
            .copied()
    }

    /// Point-in-time copy of every entry, for fan-out iteration while other
    /// tasks keep mutating the table.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect()
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::ConnectionRequest;
    use std::net::Ipv4Addr;

    fn endpoint(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port)
    }

    fn connection(local_port: u16, remote_port: u16) -> Connection {
        let header = PacketHeader::new(
            endpoint(local_port),
            endpoint(remote_port),
            ConnectionRequest::StayConnected,
        );
        Connection::new(header, ConnectionState::Connected)
    }

    #[test]
    fn insert_find_remove_round_trip() {
        let table = ConnectionTable::new(4);
        table.insert(connection(9000, 9001)).unwrap();

        let found = table.find_by_remote(&endpoint(9001)).unwrap();
        assert_eq!(found.state, ConnectionState::Connected);
        assert_eq!(found.remote_endpoint(), endpoint(9001));

        let removed = table.remove_by_remote(&endpoint(9001)).unwrap();
        assert_eq!(removed.remote_endpoint(), endpoint(9001));
        assert!(table.is_empty());
        assert!(table.find_by_remote(&endpoint(9001)).is_none());
    }

    #[test]
    fn identity_is_the_remote_endpoint() {
        let table = ConnectionTable::new(4);
        table.insert(connection(9000, 9001)).unwrap();
        // Same remote, different local port: replaces rather than grows.
        table.insert(connection(9100, 9001)).unwrap();
        assert_eq!(table.len(), 1);
        let found = table.find_by_remote(&endpoint(9001)).unwrap();
        assert_eq!(found.header.source_port, 9100);
    }

    #[test]
    fn capacity_bound_rejects_new_peers() {
        let table = ConnectionTable::new(2);
        table.insert(connection(9000, 9001)).unwrap();
        table.insert(connection(9000, 9002)).unwrap();
        let err = table.insert(connection(9000, 9003)).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLimit(2)));
        // Replacing a tracked peer is still allowed at capacity.
        assert!(table.insert(connection(9500, 9002)).is_ok());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let table = ConnectionTable::new(4);
        table.insert(connection(9000, 9001)).unwrap();
        table.insert(connection(9000, 9002)).unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);

        table.remove_by_remote(&endpoint(9001));
        // The copy is unaffected by later mutation.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(table.len(), 1);
    }
}
