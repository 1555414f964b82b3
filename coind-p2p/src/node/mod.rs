//! Node: peer pool, listener and event dispatch.
//!
//! The [`Node`] owns every peer. Peer tasks report through one channel into
//! the node's dispatch loop, which re-publishes them as [`NodeEvent`]s and is
//! the only place peers leave the pool.

pub mod events;
pub mod pool;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use coind_core::NetworkParams;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::P2pConfig;
use crate::error::{DecodeError, P2pError, P2pResult};
use crate::peer::{Connection, ConnectionDirection, PeerEvent, PeerHandle, PeerId, PeerSnapshot};
use crate::protocol::{create_greeting, decode_message, Message, MessageRegistry};

pub use events::{EventBus, NodeEvent};
pub use pool::{PeerPool, FALLBACK_LOCAL_ADDRESS};

enum Command {
    Listening(SocketAddr),
    Error(Arc<P2pError>),
    Stop(oneshot::Sender<()>),
}

struct NodeShared {
    config: Arc<P2pConfig>,
    pool: PeerPool,
    registry: Arc<MessageRegistry>,
    peer_events: mpsc::UnboundedSender<PeerEvent>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    next_peer_id: AtomicU64,
    local_addr: Mutex<Option<SocketAddr>>,
}

/// A P2P node.
///
/// Subscribe with [`Node::subscribe`] and grab a [`NodeHandle`] before
/// calling [`Node::run`].
pub struct Node {
    shared: Arc<NodeShared>,
    bus: EventBus,
    peer_events_rx: mpsc::UnboundedReceiver<PeerEvent>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

impl Node {
    /// Create a node with the standard message registry.
    pub fn new(config: P2pConfig) -> Self {
        Self::with_registry(config, MessageRegistry::standard())
    }

    /// Create a node decoding with a custom registry.
    pub fn with_registry(config: P2pConfig, registry: MessageRegistry) -> Self {
        let (peer_events, peer_events_rx) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(NodeShared {
                config: Arc::new(config),
                pool: PeerPool::new(),
                registry: Arc::new(registry),
                peer_events,
                commands,
                shutdown: CancellationToken::new(),
                next_peer_id: AtomicU64::new(1),
                local_addr: Mutex::new(None),
            }),
            bus: EventBus::new(),
            peer_events_rx,
            commands_rx,
        }
    }

    /// Register for node events.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<NodeEvent> {
        self.bus.subscribe()
    }

    /// Handle for operating the node while it runs.
    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            shared: self.shared.clone(),
        }
    }

    /// Run the dispatch loop until the node is stopped.
    pub async fn run(mut self) {
        tracing::info!(
            network = %self.shared.config.network,
            subscribers = self.bus.subscriber_count(),
            "P2P node started"
        );

        loop {
            tokio::select! {
                biased;

                Some(command) = self.commands_rx.recv() => match command {
                    Command::Listening(addr) => self.bus.publish(NodeEvent::Listening(addr)),
                    Command::Error(error) => self.bus.publish(NodeEvent::Error(error)),
                    Command::Stop(reply) => {
                        self.shutdown_peers();
                        let _ = reply.send(());
                        break;
                    }
                },

                _ = self.shared.shutdown.cancelled() => {
                    self.shutdown_peers();
                    break;
                }

                Some(event) = self.peer_events_rx.recv() => {
                    self.dispatch(event);
                }
            }
        }

        tracing::info!("P2P node stopped");
    }

    /// Re-publish a peer event with the peer attached.
    fn dispatch(&mut self, event: PeerEvent) {
        let Some(peer) = self.shared.pool.get(event.peer()) else {
            tracing::trace!(peer = %event.peer(), "Dropping event for departed peer");
            return;
        };

        match event {
            PeerEvent::Connected { .. } => self.bus.publish(NodeEvent::PeerConnect(peer)),
            PeerEvent::Message { message, .. } => {
                tracing::trace!(peer = %peer.id(), command = message.command(), "Received message");
                self.bus.publish(NodeEvent::Message(peer, message));
            }
            PeerEvent::Sent { message, .. } => self.bus.publish(NodeEvent::Send(peer, message)),
            PeerEvent::Error { error, .. } => self.bus.publish(NodeEvent::PeerError(peer, error)),
            PeerEvent::Closed { peer: id } => {
                self.shared.pool.remove(id);
                peer.disconnect();
                tracing::info!(peer = %id, addr = %peer.addr(), remaining = self.shared.pool.len(), "Peer disconnected");
                self.bus.publish(NodeEvent::PeerDisconnect(peer));
            }
        }
    }

    /// Disconnect every peer, last added first, then cancel all tasks.
    fn shutdown_peers(&mut self) {
        if !self.shared.pool.is_empty() {
            tracing::info!(count = self.shared.pool.len(), "Shutting down peer connections");
        }

        for id in self.shared.pool.ids_descending() {
            if let Some(peer) = self.shared.pool.remove(id) {
                peer.disconnect();
                self.bus.publish(NodeEvent::PeerDisconnect(peer));
            }
        }
        self.shared.shutdown.cancel();
    }
}

/// Cloneable handle to a running [`Node`].
#[derive(Clone)]
pub struct NodeHandle {
    shared: Arc<NodeShared>,
}

impl NodeHandle {
    /// Open an outbound connection.
    ///
    /// The peer joins the pool immediately; `PeerConnect` follows once the
    /// socket is established.
    pub fn connect(&self, addr: SocketAddr) -> PeerHandle {
        let (peer, connection) = self.create_peer(addr, ConnectionDirection::Outbound);
        let connect_timeout = self.shared.config.connect_timeout;
        tokio::spawn(connection.run_outbound(connect_timeout));
        peer
    }

    /// Open an outbound connection to every configured bootstrap peer.
    pub fn connect_bootstrap_peers(&self) -> Vec<PeerHandle> {
        let peers = &self.shared.config.bootstrap_peers;
        tracing::info!(count = peers.len(), "Connecting to bootstrap peers");
        peers.iter().map(|addr| self.connect(*addr)).collect()
    }

    /// Bind a listener and accept inbound peers until shutdown.
    pub async fn listen(&self, addr: SocketAddr) -> P2pResult<SocketAddr> {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                tracing::error!(addr = %addr, error = %source, "Failed to bind listener");
                let reported = P2pError::Listen {
                    addr,
                    source: io::Error::new(source.kind(), source.to_string()),
                };
                let _ = self.shared.commands.send(Command::Error(Arc::new(reported)));
                return Err(P2pError::Listen { addr, source });
            }
        };

        let local_addr = listener.local_addr()?;
        *self.shared.local_addr.lock() = Some(local_addr);
        tracing::info!(addr = %local_addr, "P2P node listening");
        let _ = self.shared.commands.send(Command::Listening(local_addr));

        let handle = self.clone();
        tokio::spawn(async move { handle.accept_loop(listener).await });

        Ok(local_addr)
    }

    async fn accept_loop(self, listener: TcpListener) {
        let shutdown = self.shared.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, addr)) => {
                        tracing::debug!(addr = %addr, "Accepted inbound");
                        self.spawn_inbound(stream, addr);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept error");
                    }
                },
            }
        }
        tracing::debug!("Listener closed");
    }

    fn spawn_inbound(&self, stream: TcpStream, addr: SocketAddr) -> PeerHandle {
        let (peer, connection) = self.create_peer(addr, ConnectionDirection::Inbound);
        tokio::spawn(connection.run_inbound(stream));
        peer
    }

    fn create_peer(&self, addr: SocketAddr, direction: ConnectionDirection) -> (PeerHandle, Connection) {
        let id = PeerId::new(self.shared.next_peer_id.fetch_add(1, Ordering::Relaxed));
        let magic = self.shared.config.params().magic;
        let (peer, outbound_rx) = PeerHandle::new(
            id,
            addr,
            direction,
            magic,
            self.shared.peer_events.clone(),
            self.shared.shutdown.child_token(),
        );
        self.shared.pool.insert(peer.clone());

        // Queued first, so it is written as soon as the socket is usable
        peer.send(Message::Version(create_greeting(&self.shared.config, addr)));

        let connection = Connection {
            peer: peer.clone(),
            outbound_rx,
            registry: self.shared.registry.clone(),
            magic,
        };
        (peer, connection)
    }

    /// Disconnect a peer. Its `PeerDisconnect` follows once the node
    /// processes the close.
    pub fn disconnect(&self, id: PeerId) -> P2pResult<()> {
        let peer = self.shared.pool.get(id).ok_or(P2pError::PeerNotFound(id))?;
        peer.disconnect();
        Ok(())
    }

    /// Disconnect every peer and stop the node.
    ///
    /// No events are published once this returns.
    pub async fn stop(&self) {
        let (reply, done) = oneshot::channel();
        if self.shared.commands.send(Command::Stop(reply)).is_ok() && done.await.is_ok() {
            return;
        }
        // The dispatch loop is not running
        self.shared.shutdown.cancel();
    }

    /// Decode a raw frame with the node's registry and magic.
    pub fn dispatch_inbound(&self, raw: &Bytes) -> Result<Message, DecodeError> {
        decode_message(raw, self.shared.config.params().magic, &self.shared.registry)
    }

    /// Uniformly chosen peer.
    pub fn random_peer(&self) -> Option<PeerHandle> {
        self.shared.pool.random_peer()
    }

    /// Look up a peer.
    pub fn peer(&self, id: PeerId) -> Option<PeerHandle> {
        self.shared.pool.get(id)
    }

    /// Check whether a peer is still in the pool.
    pub fn contains(&self, id: PeerId) -> bool {
        self.shared.pool.contains(id)
    }

    /// Number of peers in the pool.
    pub fn peer_count(&self) -> usize {
        self.shared.pool.len()
    }

    /// Reporting view of every peer.
    pub fn peers(&self) -> Vec<PeerSnapshot> {
        self.shared.pool.snapshot()
    }

    /// Our address as most peers report it.
    pub fn local_address_guess(&self) -> IpAddr {
        self.shared.pool.local_address_guess()
    }

    /// Bound listener address, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.lock()
    }

    /// Whether the node is listening.
    pub fn is_listening(&self) -> bool {
        self.local_addr().is_some()
    }

    /// Node configuration.
    pub fn config(&self) -> &P2pConfig {
        &self.shared.config
    }

    /// Parameters of the node's network.
    pub fn params(&self) -> &'static NetworkParams {
        self.shared.config.params()
    }

    /// Token cancelled when the node stops.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }
}
