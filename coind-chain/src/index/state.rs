//! Header index state.

use std::collections::HashMap;

use coind_core::{BlockHeader, Hash256};
use tracing::debug;

use crate::error::{ChainError, ChainResult};
use crate::store::IncompleteBlock;

use super::locator::build_block_locator;
use super::stored_header::StoredHeader;

/// Maximum number of orphan headers held while waiting for parents.
pub const MAX_ORPHANS: usize = 10_000;

/// What happened to a header passed to [`HeaderIndex::insert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The header was already known.
    Duplicate,
    /// The parent is unknown; the header waits in the orphan pool.
    Orphan,
    /// The header was linked into the index.
    Connected {
        /// Number of orphans linked as a consequence.
        relinked: usize,
        /// Whether the best chain changed.
        new_tip: bool,
    },
}

/// Index of all known headers and the current best chain.
pub struct HeaderIndex {
    /// All linked headers indexed by hash.
    headers: HashMap<Hash256, StoredHeader>,

    /// Best chain hashes, indexed by height.
    main_chain: Vec<Hash256>,

    /// Orphan headers keyed by the parent they wait for.
    orphans: HashMap<Hash256, Vec<BlockHeader>>,

    /// Total number of orphan headers.
    orphan_count: usize,
}

impl HeaderIndex {
    /// Create an index holding only `genesis`.
    pub fn new(genesis: BlockHeader) -> Self {
        let stored = StoredHeader::new(genesis, 0);
        let genesis_hash = stored.hash;

        let mut headers = HashMap::new();
        headers.insert(genesis_hash, stored);

        Self {
            headers,
            main_chain: vec![genesis_hash],
            orphans: HashMap::new(),
            orphan_count: 0,
        }
    }

    /// Get the genesis hash.
    #[inline]
    pub fn genesis_hash(&self) -> Hash256 {
        self.main_chain[0]
    }

    /// Get the best chain tip hash.
    #[inline]
    pub fn tip_hash(&self) -> Hash256 {
        self.main_chain[self.main_chain.len() - 1]
    }

    /// Get the best chain height.
    #[inline]
    pub fn height(&self) -> u64 {
        self.main_chain.len() as u64 - 1
    }

    /// Look up a linked header.
    pub fn get(&self, hash: &Hash256) -> Option<&StoredHeader> {
        self.headers.get(hash)
    }

    /// Main-chain hash at `height`.
    pub fn hash_at_height(&self, height: u64) -> Option<Hash256> {
        self.main_chain.get(height as usize).copied()
    }

    /// Number of headers waiting for a parent.
    pub fn orphan_count(&self) -> usize {
        self.orphan_count
    }

    /// Insert a header, linking any orphans that were waiting for it.
    pub fn insert(&mut self, header: BlockHeader) -> ChainResult<InsertOutcome> {
        let hash = header.hash();
        if self.headers.contains_key(&hash) || self.is_orphan(&header, &hash) {
            return Ok(InsertOutcome::Duplicate);
        }

        if header.is_genesis() {
            return Err(ChainError::GenesisMismatch {
                expected: self.genesis_hash(),
                actual: hash,
            });
        }

        if !self.headers.contains_key(&header.prev_block_hash) {
            if self.orphan_count >= MAX_ORPHANS {
                return Err(ChainError::TooManyOrphans { limit: MAX_ORPHANS });
            }
            debug!(hash = %hash, parent = %header.prev_block_hash, "Header is an orphan");
            self.orphans
                .entry(header.prev_block_hash)
                .or_default()
                .push(header);
            self.orphan_count += 1;
            return Ok(InsertOutcome::Orphan);
        }

        let old_tip = self.tip_hash();
        self.link(header);

        // Each newly linked header may free further orphans.
        let mut relinked = 0;
        let mut pending = vec![hash];
        while let Some(parent) = pending.pop() {
            if let Some(children) = self.orphans.remove(&parent) {
                self.orphan_count -= children.len();
                for child in children {
                    pending.push(child.hash());
                    self.link(child);
                    relinked += 1;
                }
            }
        }

        Ok(InsertOutcome::Connected {
            relinked,
            new_tip: self.tip_hash() != old_tip,
        })
    }

    /// Record that the block data for `hash` arrived.
    ///
    /// Returns `false` if the header is not linked.
    pub fn mark_has_data(&mut self, hash: &Hash256) -> bool {
        match self.headers.get_mut(hash) {
            Some(stored) => {
                stored.has_data = true;
                true
            }
            None => false,
        }
    }

    /// Locator hashes for the current best chain.
    pub fn block_locator(&self) -> Vec<Hash256> {
        build_block_locator(&self.main_chain)
    }

    /// Up to `limit` main-chain blocks above genesis without data.
    pub fn incomplete_blocks(&self, limit: usize) -> Vec<IncompleteBlock> {
        self.main_chain
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(height, hash)| {
                let stored = self.headers.get(hash)?;
                (!stored.has_data).then_some(IncompleteBlock {
                    hash: *hash,
                    height: height as u64,
                })
            })
            .take(limit)
            .collect()
    }

    fn is_orphan(&self, header: &BlockHeader, hash: &Hash256) -> bool {
        self.orphans
            .get(&header.prev_block_hash)
            .is_some_and(|waiting| waiting.iter().any(|h| h.hash() == *hash))
    }

    /// Store a header whose parent is linked and update the best chain.
    fn link(&mut self, header: BlockHeader) {
        let height = match self.headers.get(&header.prev_block_hash) {
            Some(parent) => parent.height + 1,
            None => return,
        };
        let stored = StoredHeader::new(header, height);
        let hash = stored.hash;
        self.headers.insert(hash, stored);

        if height > self.height() {
            self.set_tip(hash, height);
        }
    }

    /// Rewrite the main chain so that it ends at `tip`.
    fn set_tip(&mut self, tip: Hash256, height: u64) {
        self.main_chain.truncate(height as usize);
        self.main_chain.resize(height as usize + 1, Hash256::ZERO);

        let mut cursor = tip;
        let mut h = height as usize;
        loop {
            if self.main_chain[h] == cursor {
                break;
            }
            self.main_chain[h] = cursor;
            if h == 0 {
                break;
            }
            match self.headers.get(&cursor) {
                Some(stored) => cursor = stored.prev_hash(),
                None => break,
            }
            h -= 1;
        }
        debug!(tip = %tip, height, "New best header");
    }
}
