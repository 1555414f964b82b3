//! Chain store interface.

use async_trait::async_trait;
use coind_core::{Block, BlockHeader, Hash256};
use tokio::sync::broadcast;

use crate::error::ChainResult;

/// Notifications published by a chain store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainNotification {
    /// The store finished loading and accepts queries.
    Ready,
    /// Previously orphaned headers were attached to the chain.
    Relinked,
}

/// A main-chain header whose block data is still missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IncompleteBlock {
    /// Block hash.
    pub hash: Hash256,
    /// Height on the main chain.
    pub height: u64,
}

/// Storage consumed by the sync controller.
///
/// Queries may run concurrently with updates. Updates are fire and forget
/// from the caller's point of view; errors are only worth logging.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Check whether the store has finished loading.
    fn is_ready(&self) -> bool;

    /// Height of the best header chain.
    fn height(&self) -> u64;

    /// Add a header received from the network.
    async fn add_block_header(&self, header: BlockHeader) -> ChainResult<()>;

    /// Attach block data to its header.
    async fn add_block_transactions(&self, block: Block) -> ChainResult<()>;

    /// Locator hashes for a `getheaders` request, `None` while busy.
    async fn block_locator_hashes(&self) -> Option<Vec<Hash256>>;

    /// Up to `limit` main-chain blocks without data, ascending height.
    async fn incomplete_blocks(&self, limit: usize) -> Vec<IncompleteBlock>;

    /// Subscribe to readiness and relink notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChainNotification>;
}
