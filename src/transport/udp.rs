//! # UDP Transport Engine
//!
//! One socket, two background tasks, two queues, one connection table.
//!
//! ## Lifecycle
//! ```text
//! Unbound --bind()--> Bound --run()--> Running --dispose()--> Closed
//! ```
//!
//! `run()` spawns the receive and send tasks. Both select on a shutdown
//! watch channel; `dispose()` flips it, joins both tasks, and drops the
//! socket. Buffers still queued at shutdown are dropped, not returned to
//! the pool, which is an accepted shutdown cost.
//!
//! ## Delivery model
//! Outbound buffers without a pre-stamped header fan out to every tracked
//! connection, each stamped with that connection's header. Unicast requires
//! [`TransportEngine::enqueue_send_stamped`] with a caller-written header.
//!
//! Inbound datagrams run the validation algorithm: traffic from tracked,
//! connected peers is delivered; connect requests build table entries
//! without ever surfacing to the application; disconnect requests evict the
//! sender. Unsolicited non-connect datagrams are delivered as-is. That
//! permissive default is deliberate and is not a security boundary.

use std::net::{SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::TransportConfig;
use crate::core::header::{ConnectionRequest, PacketHeader, HEADER_LEN};
use crate::error::{constants, Result, TransportError};
use crate::protocol::connection::{Connection, ConnectionState, ConnectionTable};
use crate::utils::buffer_pool::{BufferPool, PacketBuffer};
use crate::utils::logging::TransportLogger;
use crate::utils::metrics::Metrics;

/// Lifecycle of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Unbound,
    Bound,
    Running,
    Closed,
}

impl EngineState {
    fn name(self) -> &'static str {
        match self {
            EngineState::Unbound => "unbound",
            EngineState::Bound => "bound",
            EngineState::Running => "running",
            EngineState::Closed => "closed",
        }
    }
}

/// One entry on the outbound queue. `header_included` means the buffer's
/// header region was written by the producer and must not be restamped.
struct SendPacket {
    buffer: PacketBuffer,
    header_included: bool,
}

/// Everything the background tasks share. Cloned once per task.
#[derive(Clone)]
struct LoopContext {
    socket: Arc<UdpSocket>,
    pool: Arc<BufferPool<PacketBuffer>>,
    connections: Arc<ConnectionTable>,
    logger: Arc<dyn TransportLogger>,
    metrics: Arc<Metrics>,
    mtu: usize,
}

/// Allocation-conscious UDP transport with pooled buffers and a lightweight
/// connect/disconnect handshake.
///
/// The engine shares its [`BufferPool`] with the application: outbound
/// buffers are acquired by the caller and handed over on enqueue; inbound
/// buffers are handed out by [`TransportEngine::try_receive`] and must be
/// released once read. Connects are optimistic and fire-and-forget; an
/// entry is Connected as soon as the request is queued, whether or not the
/// peer ever replies. Treat it as best-effort signaling.
pub struct TransportEngine {
    config: TransportConfig,
    pool: Arc<BufferPool<PacketBuffer>>,
    logger: Arc<dyn TransportLogger>,
    metrics: Arc<Metrics>,
    connections: Arc<ConnectionTable>,
    state: Mutex<EngineState>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    local_addr: Mutex<Option<SocketAddrV4>>,
    outbound_tx: mpsc::UnboundedSender<SendPacket>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<SendPacket>>>,
    inbound_tx: mpsc::UnboundedSender<PacketBuffer>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<PacketBuffer>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TransportEngine {
    /// Builds an engine from a validated configuration, a shared buffer
    /// pool, and a logging sink.
    pub fn new(
        config: TransportConfig,
        pool: Arc<BufferPool<PacketBuffer>>,
        logger: Arc<dyn TransportLogger>,
    ) -> Result<Self> {
        config.validate_strict()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connections = Arc::new(ConnectionTable::new(config.max_connections));
        Ok(Self {
            config,
            pool,
            logger,
            metrics: Arc::new(Metrics::new()),
            connections,
            state: Mutex::new(EngineState::Unbound),
            socket: Mutex::new(None),
            local_addr: Mutex::new(None),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Binds the engine's socket to `addr`. Requires `Unbound`; rejects
    /// IPv6 endpoints. Port 0 binds to an ephemeral port.
    pub async fn bind(&self, addr: SocketAddr) -> Result<()> {
        self.require_state(EngineState::Unbound, constants::EXPECT_UNBOUND)?;
        let addr = match addr {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => return Err(TransportError::UnsupportedAddressFamily),
        };

        let socket = UdpSocket::bind(SocketAddr::V4(addr)).await?;
        let local = match socket.local_addr()? {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => return Err(TransportError::UnsupportedAddressFamily),
        };

        // Re-check under the lock: a concurrent bind may have won the race
        // while we were waiting on the socket.
        let mut state = self.lock_state();
        if *state != EngineState::Unbound {
            return Err(TransportError::InvalidState {
                expected: constants::EXPECT_UNBOUND,
                found: state.name(),
            });
        }
        *self.socket.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(socket));
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(local);
        *state = EngineState::Bound;
        drop(state);

        self.logger.log(&format!("socket bound to {local}"));
        Ok(())
    }

    /// Spawns the receive and send tasks. Requires `Bound`.
    pub fn run(&self) -> Result<()> {
        let mut state = self.lock_state();
        if *state != EngineState::Bound {
            return Err(TransportError::InvalidState {
                expected: constants::EXPECT_BOUND,
                found: state.name(),
            });
        }
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::InvalidState {
                expected: constants::EXPECT_BOUND,
                found: state.name(),
            })?;
        let outbound_rx = self
            .outbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TransportError::InvalidState {
                expected: constants::EXPECT_BOUND,
                found: state.name(),
            })?;

        let ctx = LoopContext {
            socket,
            pool: Arc::clone(&self.pool),
            connections: Arc::clone(&self.connections),
            logger: Arc::clone(&self.logger),
            metrics: Arc::clone(&self.metrics),
            mtu: self.config.mtu,
        };

        let receiver = tokio::spawn(receive_loop(
            ctx.clone(),
            self.inbound_tx.clone(),
            self.shutdown_rx.clone(),
        ));
        let sender = tokio::spawn(send_loop(ctx, outbound_rx, self.shutdown_rx.clone()));

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.push(receiver);
        tasks.push(sender);
        *state = EngineState::Running;
        drop(state);

        self.logger.log("transport engine running");
        Ok(())
    }

    /// Starts tracking `remote` and queues a connect request toward it.
    ///
    /// The entry is inserted optimistically: it is Connected from this call
    /// onward regardless of whether the peer ever answers. Requires a bound
    /// socket; rejects IPv6 endpoints and destination port 0.
    pub fn add_connection(&self, remote: SocketAddr) -> Result<()> {
        {
            let state = self.lock_state();
            match *state {
                EngineState::Bound | EngineState::Running => {}
                other => {
                    return Err(TransportError::InvalidState {
                        expected: constants::EXPECT_BOUND_OR_RUNNING,
                        found: other.name(),
                    })
                }
            }
        }
        let remote = match remote {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => return Err(TransportError::UnsupportedAddressFamily),
        };
        if remote.port() == 0 {
            return Err(TransportError::PortOutOfRange(0));
        }
        let local = self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ok_or(TransportError::InvalidState {
                expected: constants::EXPECT_BOUND_OR_RUNNING,
                found: "unbound",
            })?;

        let header = PacketHeader::new(local, remote, ConnectionRequest::Connect);

        // Track the peer before queueing the request so the fan-out that
        // carries the connect datagram already sees it.
        let mut entry_header = header;
        entry_header.set_request(ConnectionRequest::StayConnected);
        self.connections
            .insert(Connection::new(entry_header, ConnectionState::Connected))?;
        self.metrics.connection_opened();

        let mut buffer = self.pool.acquire(HEADER_LEN)?;
        if let Err(err) = header.write_to(buffer.as_mut_slice()) {
            self.pool.release(buffer);
            return Err(err);
        }
        self.enqueue(SendPacket {
            buffer,
            header_included: true,
        })?;

        self.logger.log(&format!(
            "connect request queued for {remote} ({} tracked)",
            self.connections.len()
        ));
        Ok(())
    }

    /// Queues `buffer` for broadcast to every tracked connection. The send
    /// task stamps each connection's header into the buffer before
    /// transmitting.
    pub fn enqueue_send(&self, buffer: PacketBuffer) -> Result<()> {
        self.enqueue(SendPacket {
            buffer,
            header_included: false,
        })
    }

    /// Queues `buffer` whose header region the caller already wrote. The
    /// send task transmits it unchanged to every tracked connection.
    pub fn enqueue_send_stamped(&self, buffer: PacketBuffer) -> Result<()> {
        self.enqueue(SendPacket {
            buffer,
            header_included: true,
        })
    }

    /// Non-blocking pop of the inbound queue. Returns only validated
    /// datagrams; never fails. Release the buffer back to the pool once
    /// done reading.
    pub fn try_receive(&self) -> Option<PacketBuffer> {
        self.inbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    /// Stops both tasks, joins them, and drops the socket. Idempotent;
    /// queued buffers are dropped rather than returned to the pool.
    pub async fn dispose(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            if *state == EngineState::Closed {
                return Ok(());
            }
            *state = EngineState::Closed;
        }
        let _ = self.shutdown_tx.send(true);

        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(err) = task.await {
                self.logger.log_error(&format!("transport task ended abnormally: {err}"));
            }
        }

        *self.socket.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.logger.log("transport engine closed");
        Ok(())
    }

    /// The bound local endpoint, once `bind` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        *self
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of the connection table.
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.snapshot()
    }

    /// Number of tracked peers.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Shared handle to this engine's traffic counters.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// The configuration this engine was built from.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn enqueue(&self, packet: SendPacket) -> Result<()> {
        {
            let state = self.lock_state();
            if *state == EngineState::Closed {
                self.pool.release(packet.buffer);
                return Err(TransportError::InvalidState {
                    expected: constants::EXPECT_NOT_CLOSED,
                    found: EngineState::Closed.name(),
                });
            }
        }
        self.outbound_tx.send(packet).map_err(|err| {
            self.pool.release(err.0.buffer);
            TransportError::InvalidState {
                expected: constants::EXPECT_NOT_CLOSED,
                found: EngineState::Closed.name(),
            }
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_state(&self, expected: EngineState, phrase: &'static str) -> Result<()> {
        let state = self.lock_state();
        if *state != expected {
            return Err(TransportError::InvalidState {
                expected: phrase,
                found: state.name(),
            });
        }
        Ok(())
    }
}

impl Drop for TransportEngine {
    fn drop(&mut self) {
        // Detached tasks must not outlive the engine if dispose was skipped.
        let _ = self.shutdown_tx.send(true);
    }
}

/// Pulls datagrams off the socket into pooled buffers, validates them, and
/// hands accepted ones to the inbound queue.
async fn receive_loop(
    ctx: LoopContext,
    inbound_tx: mpsc::UnboundedSender<PacketBuffer>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let mut buffer = match ctx.pool.acquire(ctx.mtu) {
            Ok(buffer) => buffer,
            Err(err) => {
                // Only reachable with an MTU of zero, which validation
                // rejects before the engine exists.
                ctx.logger.log_exception(&err);
                break;
            }
        };
        tokio::select! {
            // Shutdown requested: put the unused buffer back and stop.
            _ = shutdown.changed() => {
                ctx.pool.release(buffer);
                break;
            }
            received = ctx.socket.recv_from(buffer.as_mut_slice()) => match received {
                Ok((len, _)) => {
                    buffer.set_payload(len);
                    ctx.metrics.datagram_received(len as u64);
                    ctx.logger.log(&format!("received {len} byte datagram"));
                    if validate_received(&ctx.connections, &*ctx.logger, &ctx.metrics, &buffer) {
                        ctx.metrics.datagram_delivered();
                        if let Err(err) = inbound_tx.send(buffer) {
                            // Inbound side is gone; recycle rather than leak.
                            ctx.pool.release(err.0);
                            break;
                        }
                    } else {
                        ctx.metrics.datagram_rejected();
                        ctx.pool.release(buffer);
                    }
                }
                Err(err) => {
                    // Transient by policy: log and keep receiving.
                    ctx.logger.log_exception(&err);
                    ctx.metrics.recv_error();
                    ctx.pool.release(buffer);
                }
            }
        }
    }
}

/// Decides whether a received datagram reaches the application, updating
/// the connection table along the way.
///
/// Rejections are routine protocol events, not errors: connect requests
/// build table entries, disconnect requests evict the sender, traffic from
/// peers marked Disconnected evicts silently. Anything from an unknown,
/// non-connecting sender is delivered (permissive default).
fn validate_received(
    connections: &ConnectionTable,
    logger: &dyn TransportLogger,
    metrics: &Metrics,
    buffer: &PacketBuffer,
) -> bool {
    let header = match PacketHeader::read_from(buffer.as_slice()) {
        Ok(header) => header,
        Err(err) => {
            // Unreachable while the MTU covers the header region; kept so a
            // decode failure can never take the receive task down.
            logger.log_exception(&err);
            return false;
        }
    };
    let sender = header.source_endpoint();

    if let Some(connection) = connections.find_by_remote(&sender) {
        if connection.state == ConnectionState::Disconnected {
            connections.remove_by_remote(&sender);
            return false;
        }
        if connection.state == ConnectionState::Connected
            && header.request == ConnectionRequest::Disconnect
        {
            connections.remove_by_remote(&sender);
            metrics.connection_closed();
            logger.log(&format!(
                "peer {sender} disconnected ({} tracked)",
                connections.len()
            ));
            return false;
        }
        return true;
    }

    if header.request == ConnectionRequest::Connect {
        let mut entry_header = header;
        entry_header.swap_endpoints();
        entry_header.set_request(ConnectionRequest::StayConnected);
        match connections.insert(Connection::new(entry_header, ConnectionState::Connected)) {
            Ok(()) => {
                metrics.connection_opened();
                logger.log(&format!(
                    "peer {sender} connected ({} tracked)",
                    connections.len()
                ));
            }
            Err(err) => {
                logger.log_warning(&format!("rejecting connect from {sender}: {err}"));
            }
        }
        // The handshake itself is never delivered to the application.
        return false;
    }

    true
}

/// Drains the outbound queue and fans each packet out to every tracked
/// connection.
async fn send_loop(
    ctx: LoopContext,
    mut outbound_rx: mpsc::UnboundedReceiver<SendPacket>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            dequeued = outbound_rx.recv() => {
                let Some(mut packet) = dequeued else { break };
                let capacity = packet.buffer.capacity();
                if capacity < HEADER_LEN || capacity > ctx.mtu {
                    // Caller bug: fatal to this attempt, never to the loop.
                    let err = TransportError::ProtocolViolation(format!(
                        "outbound buffer of {capacity} bytes is outside the sendable range \
                         ({HEADER_LEN}..={})",
                        ctx.mtu
                    ));
                    ctx.logger.log_error(&err.to_string());
                    ctx.pool.release(packet.buffer);
                    continue;
                }

                for connection in ctx.connections.snapshot() {
                    if !packet.header_included {
                        if let Err(err) = connection.header.write_to(packet.buffer.as_mut_slice()) {
                            ctx.logger.log_exception(&err);
                            break;
                        }
                    }
                    // Transmit at least the header region even if the
                    // producer never advanced the write cursor.
                    let len = packet.buffer.offset().max(HEADER_LEN);
                    let remote = connection.remote_endpoint();
                    match ctx
                        .socket
                        .send_to(&packet.buffer.as_slice()[..len], SocketAddr::V4(remote))
                        .await
                    {
                        Ok(sent) => {
                            ctx.metrics.datagram_sent(sent as u64);
                            ctx.logger.log(&format!("sent {sent} bytes to {remote}"));
                        }
                        Err(err) => {
                            // Keep fanning out to the remaining peers.
                            ctx.logger.log_exception(&err);
                            ctx.metrics.send_error();
                        }
                    }
                }

                ctx.pool.release(packet.buffer);
            }
        }
    }
}
