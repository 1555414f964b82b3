//! Stored header with metadata.

use coind_core::{BlockHeader, Hash256};

/// A header stored in the index with additional metadata.
#[derive(Clone, Debug)]
pub struct StoredHeader {
    /// The header itself.
    pub header: BlockHeader,

    /// Header hash (cached).
    pub hash: Hash256,

    /// Distance from genesis.
    pub height: u64,

    /// Whether the block's transactions have been received.
    pub has_data: bool,
}

impl StoredHeader {
    /// Create a new stored header without block data.
    pub fn new(header: BlockHeader, height: u64) -> Self {
        let hash = header.hash();
        Self {
            header,
            hash,
            height,
            has_data: false,
        }
    }

    /// Get the previous block hash.
    #[inline]
    pub fn prev_hash(&self) -> Hash256 {
        self.header.prev_block_hash
    }
}
