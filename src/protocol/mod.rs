//! # Connection Protocol
//!
//! The lightweight notion of "connection" layered over UDP.
//!
//! There is no session, sequencing, or retransmission here: a connection is
//! a locally-held record of a remote peer plus a lifecycle state, driven by
//! the connect/disconnect request byte in each packet header.
//!
//! ## Components
//! - **Connection**: header template and lifecycle state for one peer
//! - **ConnectionTable**: thread-safe set of peers keyed by remote endpoint

pub mod connection;

pub use connection::{Connection, ConnectionState, ConnectionTable};
