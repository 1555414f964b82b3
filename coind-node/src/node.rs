//! Node orchestrator.
//!
//! Wires the chain store, the P2P node, the sync controller and an event
//! logger together and runs them until shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use coind_chain::{ChainStore, MemoryChainStore};
use coind_p2p::discovery::bootstrap_addresses;
use coind_p2p::protocol::COMMON_OPAQUE_COMMANDS;
use coind_p2p::{MessageRegistry, Node as P2pNode, NodeEvent, SyncController};

use crate::config::NodeConfig;

/// The main node structure.
pub struct Node {
    /// Node configuration.
    config: NodeConfig,

    /// Header index fed by the sync controller.
    store: Arc<MemoryChainStore>,
}

impl Node {
    /// Create a new node with the given configuration.
    pub fn new(config: NodeConfig) -> Self {
        let store = Arc::new(MemoryChainStore::new(config.network.params()));
        tracing::info!(
            network = %config.network,
            genesis = %config.network.params().genesis.hash,
            "Chain store initialized"
        );
        Self { config, store }
    }

    /// The node's chain store.
    pub fn store(&self) -> Arc<MemoryChainStore> {
        self.store.clone()
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let params = self.config.network.params();

        // Widely used commands we do not act on decode as opaque messages
        let mut registry = MessageRegistry::standard();
        for command in COMMON_OPAQUE_COMMANDS {
            registry.register_opaque(command);
        }

        let mut bootstrap = self.config.connect.clone();
        if self.config.dns_seeds {
            bootstrap.extend(bootstrap_addresses(params).await);
        }
        let p2p_config = self.config.p2p_config().with_bootstrap_peers(bootstrap);

        let mut p2p = P2pNode::with_registry(p2p_config, registry);
        let events = p2p.subscribe();
        let sync = SyncController::new(&mut p2p, self.store.clone(), self.config.sync.clone());
        let handle = p2p.handle();

        let p2p_task = tokio::spawn(p2p.run());
        let sync_task = tokio::spawn(sync.run());
        let log_task = tokio::spawn(log_events(events));

        if let Some(addr) = self.config.listen_addr {
            if let Err(e) = handle.listen(addr).await {
                handle.stop().await;
                return Err(e.into());
            }
        }

        handle.connect_bootstrap_peers();

        self.store.mark_ready();

        shutdown.cancelled().await;
        tracing::info!(height = self.store.height(), "Shutting down");

        handle.stop().await;
        let _ = p2p_task.await;
        let _ = sync_task.await;
        let _ = log_task.await;

        tracing::info!("Node stopped");
        Ok(())
    }
}

/// Log node events until the node stops.
async fn log_events(mut events: mpsc::UnboundedReceiver<NodeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            NodeEvent::Listening(addr) => tracing::info!(addr = %addr, "Listening"),
            NodeEvent::PeerConnect(peer) => {
                tracing::debug!(peer = %peer.id(), addr = %peer.addr(), "Peer announced");
            }
            NodeEvent::PeerDisconnect(peer) => {
                tracing::debug!(peer = %peer.id(), addr = %peer.addr(), "Peer removed");
            }
            NodeEvent::PeerError(peer, error) => {
                tracing::debug!(peer = %peer.id(), error = %error, "Peer error");
            }
            NodeEvent::Error(error) => tracing::error!(error = %error, "Node error"),
            NodeEvent::Message(peer, message) => {
                tracing::trace!(peer = %peer.id(), message = %message, "Message");
            }
            NodeEvent::Send(peer, message) => {
                tracing::trace!(peer = %peer.id(), command = message.command(), "Sent");
            }
        }
    }
}
