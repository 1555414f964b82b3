//! # coind core
//!
//! Core types and wire primitives shared by every coind crate.
//!
//! This crate provides the foundation for the other crates:
//! - Double-SHA256 hashing and the [`Hash256`] type
//! - Consensus encoding primitives (CompactSize integers, var-strings)
//! - Block header and block structures
//! - Network parameter tables (magic bytes, ports, genesis, DNS seeds)

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
pub mod crypto;
pub mod error;
pub mod network;
pub mod serialization;

// Re-export commonly used types at crate root
pub use block::{Block, BlockHeader};
pub use crypto::{sha256, sha256d, Hash256};
pub use error::EncodingError;
pub use network::{Network, NetworkParams, UnknownNetwork};
pub use serialization::{Decodable, Encodable};
