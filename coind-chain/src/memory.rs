//! In-memory chain store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use coind_core::{Block, BlockHeader, Hash256, NetworkParams};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{ChainError, ChainResult};
use crate::index::{HeaderIndex, InsertOutcome};
use crate::store::{ChainNotification, ChainStore, IncompleteBlock};

/// Capacity of the notification channel.
const NOTIFICATION_CAPACITY: usize = 64;

/// A [`ChainStore`] holding the header index in memory.
///
/// The store starts out not ready; call [`MemoryChainStore::mark_ready`]
/// once it should start answering the sync controller.
pub struct MemoryChainStore {
    index: RwLock<HeaderIndex>,
    height: AtomicU64,
    ready: AtomicBool,
    notifications: broadcast::Sender<ChainNotification>,
}

impl MemoryChainStore {
    /// Create a store seeded with the network's genesis header.
    pub fn new(params: &NetworkParams) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            index: RwLock::new(HeaderIndex::new(params.genesis_header())),
            height: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            notifications,
        }
    }

    /// Flip the store to ready and notify subscribers.
    ///
    /// Calling it again has no effect.
    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!(height = self.height(), "Chain store ready");
            let _ = self.notifications.send(ChainNotification::Ready);
        }
    }

    /// Best chain tip hash.
    pub fn tip_hash(&self) -> Hash256 {
        self.index.read().tip_hash()
    }

    /// Number of orphan headers.
    pub fn orphan_count(&self) -> usize {
        self.index.read().orphan_count()
    }

    /// Check whether a header is linked into the index.
    pub fn contains(&self, hash: &Hash256) -> bool {
        self.index.read().get(hash).is_some()
    }

    /// Run `f` with the index write-locked.
    ///
    /// While `f` runs, locator queries report the store as busy.
    pub fn with_index_locked<R>(&self, f: impl FnOnce(&mut HeaderIndex) -> R) -> R {
        let mut index = self.index.write();
        let result = f(&mut index);
        self.height.store(index.height(), Ordering::SeqCst);
        result
    }

    fn insert_header(&self, header: BlockHeader) -> ChainResult<InsertOutcome> {
        let outcome = self.with_index_locked(|index| index.insert(header))?;
        if let InsertOutcome::Connected { relinked, .. } = outcome {
            if relinked > 0 {
                debug!(relinked, "Orphan headers relinked");
                let _ = self.notifications.send(ChainNotification::Relinked);
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    async fn add_block_header(&self, header: BlockHeader) -> ChainResult<()> {
        self.insert_header(header).map(|_| ())
    }

    async fn add_block_transactions(&self, block: Block) -> ChainResult<()> {
        let hash = block.hash();
        if let InsertOutcome::Orphan = self.insert_header(block.header)? {
            return Err(ChainError::UnknownBlock { hash });
        }
        if !self.with_index_locked(|index| index.mark_has_data(&hash)) {
            return Err(ChainError::UnknownBlock { hash });
        }
        debug!(hash = %hash, txs = block.transaction_count, "Block data stored");
        Ok(())
    }

    async fn block_locator_hashes(&self) -> Option<Vec<Hash256>> {
        let index = self.index.try_read()?;
        Some(index.block_locator())
    }

    async fn incomplete_blocks(&self, limit: usize) -> Vec<IncompleteBlock> {
        self.index.read().incomplete_blocks(limit)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChainNotification> {
        self.notifications.subscribe()
    }
}
