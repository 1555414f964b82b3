//! Shared handle to a peer connection.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::P2pError;
use crate::protocol::{encode_message, Message};

use super::info::{ConnectionDirection, PeerId, PeerInfo, PeerSnapshot};

/// Events emitted by a peer to its node.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// The transport is established.
    Connected { peer: PeerId },
    /// A message was decoded from the stream.
    Message { peer: PeerId, message: Arc<Message> },
    /// A message was queued for writing.
    Sent { peer: PeerId, message: Arc<Message> },
    /// A decode, encode or transport error occurred.
    Error { peer: PeerId, error: Arc<P2pError> },
    /// The connection is gone. Emitted at most once per peer.
    Closed { peer: PeerId },
}

impl PeerEvent {
    /// The peer that emitted this event.
    pub fn peer(&self) -> PeerId {
        match self {
            PeerEvent::Connected { peer }
            | PeerEvent::Message { peer, .. }
            | PeerEvent::Sent { peer, .. }
            | PeerEvent::Error { peer, .. }
            | PeerEvent::Closed { peer } => *peer,
        }
    }
}

struct PeerShared {
    id: PeerId,
    addr: SocketAddr,
    direction: ConnectionDirection,
    magic: [u8; 4],
    info: RwLock<PeerInfo>,
    outbound: mpsc::UnboundedSender<Bytes>,
    events: mpsc::UnboundedSender<PeerEvent>,
    cancel: CancellationToken,
}

/// Cloneable handle to one peer.
///
/// Sending never blocks: frames are queued for the connection's writer
/// task. Handles stay usable after the connection closes; sends are then
/// silently dropped.
#[derive(Clone)]
pub struct PeerHandle {
    shared: Arc<PeerShared>,
}

impl PeerHandle {
    /// Create a handle and the receiving end of its outbound frame queue.
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        direction: ConnectionDirection,
        magic: [u8; 4],
        events: mpsc::UnboundedSender<PeerEvent>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let handle = Self {
            shared: Arc::new(PeerShared {
                id,
                addr,
                direction,
                magic,
                info: RwLock::new(PeerInfo::new()),
                outbound,
                events,
                cancel,
            }),
        };
        (handle, outbound_rx)
    }

    /// Peer ID.
    pub fn id(&self) -> PeerId {
        self.shared.id
    }

    /// Remote address.
    pub fn addr(&self) -> SocketAddr {
        self.shared.addr
    }

    /// Connection direction.
    pub fn direction(&self) -> ConnectionDirection {
        self.shared.direction
    }

    /// Whether the peer connected to us.
    pub fn is_inbound(&self) -> bool {
        self.shared.direction == ConnectionDirection::Inbound
    }

    /// Whether the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Copy of the peer's current info.
    pub fn info(&self) -> PeerInfo {
        self.shared.info.read().clone()
    }

    /// Reporting view of the peer.
    pub fn snapshot(&self) -> PeerSnapshot {
        let info = self.shared.info.read();
        PeerSnapshot {
            id: self.shared.id,
            addr: self.shared.addr,
            direction: self.shared.direction,
            user_agent: info.user_agent.clone(),
            start_height: info.start_height,
            verack_received: info.verack_received,
            bytes_recv: info.bytes_recv,
            bytes_sent: info.bytes_sent,
        }
    }

    /// Encode and queue a message.
    ///
    /// If encoding fails an [`PeerEvent::Error`] is emitted and nothing is
    /// written to the stream.
    pub fn send(&self, message: Message) {
        let message = Arc::new(message);
        let frame = match encode_message(&message, self.shared.magic) {
            Ok(frame) => frame,
            Err(source) => {
                tracing::warn!(peer = %self.shared.id, command = message.command(), error = %source, "Failed to encode message");
                self.emit(PeerEvent::Error {
                    peer: self.shared.id,
                    error: Arc::new(P2pError::Encode { source, message }),
                });
                return;
            }
        };

        if self.is_closed() {
            tracing::trace!(peer = %self.shared.id, command = message.command(), "Dropping send to closed peer");
            return;
        }

        self.shared.info.write().record_send(frame.len() as u64);
        if self.shared.outbound.send(frame).is_err() {
            return;
        }
        tracing::trace!(peer = %self.shared.id, command = message.command(), "Queued message");
        self.emit(PeerEvent::Sent {
            peer: self.shared.id,
            message,
        });
    }

    /// Tear down the connection.
    pub fn disconnect(&self) {
        self.shared.cancel.cancel();
    }

    /// Token cancelled when the connection goes away.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    pub(crate) fn update_info<R>(&self, f: impl FnOnce(&mut PeerInfo) -> R) -> R {
        f(&mut self.shared.info.write())
    }

    pub(crate) fn emit(&self, event: PeerEvent) {
        let _ = self.shared.events.send(event);
    }
}

impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for PeerHandle {}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.shared.id)
            .field("addr", &self.shared.addr)
            .field("direction", &self.shared.direction)
            .finish()
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.shared.id, self.shared.addr)
    }
}
