//! Peer connection management.
//!
//! This module provides:
//! - Peer identification and metadata
//! - The cloneable peer handle used to send and disconnect
//! - Per-peer read/write tasks with message framing

pub mod connection;
pub mod handle;
pub mod info;

// Re-export main types
pub use connection::InboundBuffer;
pub use handle::{PeerEvent, PeerHandle};
pub use info::{ConnectionDirection, PeerId, PeerInfo, PeerSnapshot};

pub(crate) use connection::Connection;
