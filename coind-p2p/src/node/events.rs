//! Node-level events and their fan-out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::P2pError;
use crate::peer::PeerHandle;
use crate::protocol::Message;

/// Events published by a [`Node`](super::Node).
///
/// Peer events carry the originating peer; no event for a peer is published
/// after its [`NodeEvent::PeerDisconnect`].
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A peer delivered a decoded message.
    Message(PeerHandle, Arc<Message>),
    /// A message was queued to a peer.
    Send(PeerHandle, Arc<Message>),
    /// A peer reported an error.
    PeerError(PeerHandle, Arc<P2pError>),
    /// A node-level error, such as a failed bind.
    Error(Arc<P2pError>),
    /// A peer's transport is established.
    PeerConnect(PeerHandle),
    /// A peer left the pool.
    PeerDisconnect(PeerHandle),
    /// The listener is bound.
    Listening(SocketAddr),
}

impl NodeEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            NodeEvent::Message(..) => "message",
            NodeEvent::Send(..) => "send",
            NodeEvent::PeerError(..) => "peerError",
            NodeEvent::Error(..) => "error",
            NodeEvent::PeerConnect(..) => "peerConnect",
            NodeEvent::PeerDisconnect(..) => "peerDisconnect",
            NodeEvent::Listening(..) => "listening",
        }
    }
}

/// Fan-out of node events to every subscriber.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<mpsc::UnboundedSender<NodeEvent>>,
}

impl EventBus {
    /// Create a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<NodeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, dropping closed ones.
    pub fn publish(&mut self, event: NodeEvent) {
        tracing::trace!(event = event.name(), "Publishing node event");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let mut bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let addr: SocketAddr = "127.0.0.1:8333".parse().unwrap();
        bus.publish(NodeEvent::Listening(addr));

        assert!(matches!(a.try_recv().unwrap(), NodeEvent::Listening(x) if x == addr));
        assert!(matches!(b.try_recv().unwrap(), NodeEvent::Listening(x) if x == addr));
    }

    #[test]
    fn test_closed_subscribers_are_dropped() {
        let mut bus = EventBus::new();
        let rx = bus.subscribe();
        let _live = bus.subscribe();
        drop(rx);

        bus.publish(NodeEvent::Error(Arc::new(P2pError::Shutdown)));
        assert_eq!(bus.subscriber_count(), 1);
    }
}
