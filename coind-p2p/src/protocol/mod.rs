//! P2P protocol layer.
//!
//! This module contains:
//! - Message definitions and payload layouts
//! - Envelope framing over a receive buffer
//! - Whole-message encoding and decoding with a command registry
//! - Version handshake messages

pub mod codec;
pub mod framing;
pub mod messages;
pub mod registry;
pub mod version;

// Re-export main types
pub use codec::{decode_message, encode_message};
pub use framing::{detect_message_boundary, MessageFramer, HEADER_SIZE};
pub use messages::{
    GetHeadersMessage, HeadersMessage, InventoryItem, InventoryType, Message, NetAddress,
    VersionMessage, MAX_HEADERS_PER_MESSAGE, MAX_INVENTORY_ITEMS, MAX_LOCATOR_HASHES,
    MAX_USER_AGENT_LENGTH,
};
pub use registry::{DecodeFn, MessageRegistry, COMMON_OPAQUE_COMMANDS};
pub use version::{create_greeting, create_version_message, random_nonce};
