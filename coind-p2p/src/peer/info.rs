//! Peer information and identification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use crate::protocol::VersionMessage;

/// Unique identifier for a peer connection.
///
/// Identifiers increase monotonically within one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Create a new peer ID from a counter value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Direction of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    /// We initiated the connection.
    Outbound,
    /// Peer connected to us.
    Inbound,
}

impl fmt::Display for ConnectionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionDirection::Outbound => write!(f, "outbound"),
            ConnectionDirection::Inbound => write!(f, "inbound"),
        }
    }
}

/// Mutable state of a peer: handshake identity and transport counters.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// Services from the peer's `version`.
    pub services: Option<u64>,
    /// Chain height from the peer's `version`.
    pub start_height: Option<i32>,
    /// User agent from the peer's `version`.
    pub user_agent: Option<String>,
    /// Protocol version from the peer's `version`.
    pub protocol_version: Option<i32>,
    /// Relay flag from the peer's `version`.
    pub relay: Option<bool>,
    /// Whether the peer acknowledged our `version`.
    pub verack_received: bool,
    /// The address the peer believes we have.
    pub reported_address: Option<IpAddr>,
    /// When the peer was created.
    pub created_at: Instant,
    /// Last time bytes arrived from this peer.
    pub last_recv: Option<Instant>,
    /// Last time a message was queued to this peer.
    pub last_send: Option<Instant>,
    /// Number of bytes received from this peer.
    pub bytes_recv: u64,
    /// Number of bytes queued to this peer.
    pub bytes_sent: u64,
    /// Number of messages received from this peer.
    pub messages_recv: u64,
    /// Number of messages queued to this peer.
    pub messages_sent: u64,
}

impl Default for PeerInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerInfo {
    /// Create info for a new peer.
    pub fn new() -> Self {
        Self {
            services: None,
            start_height: None,
            user_agent: None,
            protocol_version: None,
            relay: None,
            verack_received: false,
            reported_address: None,
            created_at: Instant::now(),
            last_recv: None,
            last_send: None,
            bytes_recv: 0,
            bytes_sent: 0,
            messages_recv: 0,
            messages_sent: 0,
        }
    }

    /// Record the identity announced by the peer's `version`.
    pub fn apply_version(&mut self, version: &VersionMessage) {
        self.services = Some(version.services);
        self.start_height = Some(version.start_height);
        self.user_agent = Some(version.user_agent.clone());
        self.protocol_version = Some(version.version);
        self.relay = Some(version.relay);
        self.reported_address = Some(version.addr_recv.addr.ip());
    }

    /// Record a `verack` from the peer.
    pub fn mark_verack(&mut self) {
        self.verack_received = true;
    }

    /// Record bytes read from the socket.
    pub fn record_recv_bytes(&mut self, bytes: u64) {
        self.last_recv = Some(Instant::now());
        self.bytes_recv += bytes;
    }

    /// Record a decoded inbound message.
    pub fn record_recv_message(&mut self) {
        self.messages_recv += 1;
    }

    /// Record that we queued a message.
    pub fn record_send(&mut self, bytes: u64) {
        self.last_send = Some(Instant::now());
        self.bytes_sent += bytes;
        self.messages_sent += 1;
    }
}

/// Serializable view of a peer for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSnapshot {
    /// Peer ID.
    pub id: PeerId,
    /// Remote address.
    pub addr: SocketAddr,
    /// Connection direction.
    pub direction: ConnectionDirection,
    /// Peer's user agent, once known.
    pub user_agent: Option<String>,
    /// Peer's declared height, once known.
    pub start_height: Option<i32>,
    /// Whether the peer acknowledged our `version`.
    pub verack_received: bool,
    /// Bytes received.
    pub bytes_recv: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NetAddress;

    #[test]
    fn test_peer_id_display() {
        let id = PeerId::new(42);
        assert_eq!(format!("{}", id), "peer-42");
    }

    #[test]
    fn test_apply_version() {
        let mut info = PeerInfo::new();
        assert!(info.services.is_none());

        info.apply_version(&VersionMessage {
            version: 70002,
            services: 9,
            timestamp: 0,
            addr_recv: NetAddress::new(0, "203.0.113.9:8333".parse().unwrap()),
            addr_from: NetAddress::new(0, "0.0.0.0:0".parse().unwrap()),
            nonce: 1,
            user_agent: "/Satoshi:0.9.1/".to_string(),
            start_height: 300_000,
            relay: false,
        });

        assert_eq!(info.services, Some(9));
        assert_eq!(info.start_height, Some(300_000));
        assert_eq!(info.protocol_version, Some(70002));
        assert_eq!(info.relay, Some(false));
        assert_eq!(info.reported_address, Some("203.0.113.9".parse().unwrap()));
        assert!(!info.verack_received);

        info.mark_verack();
        assert!(info.verack_received);
    }

    #[test]
    fn test_counters() {
        let mut info = PeerInfo::new();
        info.record_recv_bytes(100);
        info.record_recv_message();
        info.record_send(24);
        info.record_send(30);

        assert_eq!(info.bytes_recv, 100);
        assert_eq!(info.messages_recv, 1);
        assert_eq!(info.bytes_sent, 54);
        assert_eq!(info.messages_sent, 2);
        assert!(info.last_send.is_some());
    }
}
