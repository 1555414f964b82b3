//! Chain storage for coind.
//!
//! This crate implements:
//! - The [`ChainStore`] interface consumed by the sync controller
//! - An in-memory header index with orphan handling
//! - Block locator construction
//! - Tracking of headers whose block data has not arrived yet
//!
//! # Example
//!
//! ```ignore
//! use coind_chain::{ChainStore, MemoryChainStore};
//! use coind_core::Network;
//!
//! let store = MemoryChainStore::new(Network::Bitcoin.params());
//! assert_eq!(store.height(), 0);
//! ```

mod error;
mod index;
mod memory;
mod store;

pub use error::{ChainError, ChainResult};
pub use index::{build_block_locator, HeaderIndex, InsertOutcome, StoredHeader, LOCATOR_DEPTH};
pub use memory::MemoryChainStore;
pub use store::{ChainNotification, ChainStore, IncompleteBlock};
