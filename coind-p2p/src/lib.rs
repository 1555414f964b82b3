//! P2P networking for coind.
//!
//! This crate provides the connection and synchronization engine of a
//! Bitcoin-family node, including:
//!
//! - The wire protocol: message envelope, payload codecs, command registry
//! - Per-peer connections with framing and handshake tracking
//! - A node owning the peer pool and re-publishing peer events
//! - Locator-based header sync and block retrieval against a chain store
//! - DNS seed bootstrap
//!
//! # Architecture
//!
//! Every peer runs a reader and a writer task. Peer events flow through one
//! channel into the node's dispatch loop, which publishes them to
//! subscribers such as the sync controller.
//!
//! ```text
//! Node::run() (dispatch loop, pool removals)
//! ├── Listener Task (accept incoming)
//! ├── Peer 1 reader / writer
//! ├── Peer 2 reader / writer
//! └── SyncController::run() (handshake replies, header/block requests)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use coind_chain::MemoryChainStore;
//! use coind_core::Network;
//! use coind_p2p::{Node, P2pConfig, SyncConfig, SyncController};
//!
//! let config = P2pConfig::new(Network::Bitcoin);
//! let store = Arc::new(MemoryChainStore::new(config.params()));
//!
//! let mut node = Node::new(config);
//! let sync = SyncController::new(&mut node, store.clone(), SyncConfig::default());
//! let handle = node.handle();
//!
//! tokio::spawn(sync.run());
//! tokio::spawn(node.run());
//! handle.connect("127.0.0.1:8333".parse()?);
//! store.mark_ready();
//! ```

pub mod config;
pub mod error;

pub mod protocol;
pub mod peer;
pub mod node;
pub mod sync;
pub mod discovery;

// Re-export main types
pub use config::{P2pConfig, SyncConfig, MAX_PAYLOAD_SIZE, NODE_NETWORK};
pub use error::{DecodeError, EncodeError, P2pError, P2pResult};
pub use node::{EventBus, Node, NodeEvent, NodeHandle, PeerPool};
pub use peer::{ConnectionDirection, PeerEvent, PeerHandle, PeerId, PeerInfo, PeerSnapshot};
pub use protocol::{Message, MessageRegistry};
pub use sync::{SyncController, SyncState};
