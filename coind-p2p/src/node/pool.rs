//! The node's set of active peers.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use parking_lot::RwLock;
use rand::seq::SliceRandom;

use crate::peer::{PeerHandle, PeerId, PeerSnapshot};

/// Address assumed for ourselves when no peer has told us otherwise.
pub const FALLBACK_LOCAL_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Ordered collection of active peers.
///
/// A peer is present from the moment its socket is created until its
/// disconnect is processed by the node.
#[derive(Debug, Default)]
pub struct PeerPool {
    peers: RwLock<Vec<PeerHandle>>,
}

impl PeerPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer.
    pub fn insert(&self, peer: PeerHandle) {
        self.peers.write().push(peer);
    }

    /// Remove a peer, returning it if it was present.
    pub fn remove(&self, id: PeerId) -> Option<PeerHandle> {
        let mut peers = self.peers.write();
        let index = peers.iter().position(|peer| peer.id() == id)?;
        Some(peers.remove(index))
    }

    /// Look up a peer.
    pub fn get(&self, id: PeerId) -> Option<PeerHandle> {
        self.peers.read().iter().find(|peer| peer.id() == id).cloned()
    }

    /// Check whether a peer is in the pool.
    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.read().iter().any(|peer| peer.id() == id)
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Uniformly chosen peer, `None` when the pool is empty.
    pub fn random_peer(&self) -> Option<PeerHandle> {
        self.peers.read().choose(&mut rand::thread_rng()).cloned()
    }

    /// Peer IDs in descending pool order.
    pub fn ids_descending(&self) -> Vec<PeerId> {
        self.peers.read().iter().rev().map(PeerHandle::id).collect()
    }

    /// Our address as most peers report it.
    ///
    /// Ties go to the smallest address so the guess is deterministic.
    pub fn local_address_guess(&self) -> IpAddr {
        let mut tally: HashMap<IpAddr, usize> = HashMap::new();
        for peer in self.peers.read().iter() {
            if let Some(addr) = peer.info().reported_address {
                *tally.entry(addr).or_default() += 1;
            }
        }

        tally
            .into_iter()
            .max_by(|(a, a_count), (b, b_count)| a_count.cmp(b_count).then_with(|| b.cmp(a)))
            .map(|(addr, _)| addr)
            .unwrap_or(FALLBACK_LOCAL_ADDRESS)
    }

    /// Reporting view of every peer.
    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        self.peers.read().iter().map(PeerHandle::snapshot).collect()
    }
}
