//! # Logging Capability
//!
//! Narrow logging interface consumed by the transport engine.
//!
//! The engine never depends on a concrete sink: it talks to a
//! [`TransportLogger`] trait object, so a console, file, or UI-queue sink
//! can all be plugged in. [`TracingLogger`] is the default and forwards to
//! [`tracing`] events; [`NullLogger`] swallows everything, which keeps noisy
//! tests quiet.
//!
//! All four operations are fire-and-forget and must never block the
//! transport loops.

use std::error::Error;

use tracing::{debug, error, warn};

/// Sink-agnostic logging operations used by the engine.
pub trait TransportLogger: Send + Sync {
    /// Routine diagnostic message.
    fn log(&self, message: &str);
    /// Unexpected but recoverable condition.
    fn log_warning(&self, message: &str);
    /// Failed operation worth operator attention.
    fn log_error(&self, message: &str);
    /// An error value with its source chain.
    fn log_exception(&self, err: &dyn Error);
}

/// Default sink forwarding onto `tracing` events. Routine messages land at
/// `debug` level so per-datagram chatter stays out of info-level output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TransportLogger for TracingLogger {
    fn log(&self, message: &str) {
        debug!(target: "udp_transport", "{message}");
    }

    fn log_warning(&self, message: &str) {
        warn!(target: "udp_transport", "{message}");
    }

    fn log_error(&self, message: &str) {
        error!(target: "udp_transport", "{message}");
    }

    fn log_exception(&self, err: &dyn Error) {
        match err.source() {
            Some(source) => {
                error!(target: "udp_transport", error = %err, caused_by = %source, "exception")
            }
            None => error!(target: "udp_transport", error = %err, "exception"),
        }
    }
}

/// Sink that discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl TransportLogger for NullLogger {
    fn log(&self, _message: &str) {}
    fn log_warning(&self, _message: &str) {}
    fn log_error(&self, _message: &str) {}
    fn log_exception(&self, _err: &dyn Error) {}
}
