//! Header and block synchronization.
//!
//! The [`SyncController`] completes handshakes and keeps the chain store fed:
//! 1. Reply to `version` with `verack`, announce ourselves to new peers
//! 2. Request headers with a block locator, throttled to one unforced
//!    request per window
//! 3. Forward received headers in order and immediately ask for more
//! 4. On every heartbeat, request data for blocks the store lacks

pub mod blocks;
pub mod headers;
pub mod state;

use std::sync::Arc;
use std::time::Instant;

use coind_chain::{ChainNotification, ChainStore, IncompleteBlock};
use coind_core::Hash256;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::node::{Node, NodeEvent, NodeHandle};
use crate::peer::PeerHandle;
use crate::protocol::{create_version_message, HeadersMessage, Message};

pub use blocks::create_get_data;
pub use headers::{create_get_headers, HeaderThrottle};
pub use state::SyncState;

/// Result of a chain-store query started by the controller.
enum QueryResult {
    Locator {
        peer: PeerHandle,
        force: bool,
        hashes: Option<Vec<Hash256>>,
    },
    Incomplete {
        peer: PeerHandle,
        blocks: Vec<IncompleteBlock>,
    },
}

/// Drives header and block sync for one node against a chain store.
pub struct SyncController {
    node: NodeHandle,
    store: Arc<dyn ChainStore>,
    config: SyncConfig,
    events: mpsc::UnboundedReceiver<NodeEvent>,
    notifications: broadcast::Receiver<ChainNotification>,
    notifications_open: bool,
    queries_tx: mpsc::UnboundedSender<QueryResult>,
    queries_rx: mpsc::UnboundedReceiver<QueryResult>,
    throttle: HeaderThrottle,
    state: SyncState,
}

impl SyncController {
    /// Create a controller subscribed to `node`'s events.
    pub fn new(node: &mut Node, store: Arc<dyn ChainStore>, config: SyncConfig) -> Self {
        let events = node.subscribe();
        let notifications = store.subscribe();
        let (queries_tx, queries_rx) = mpsc::unbounded_channel();

        Self {
            node: node.handle(),
            store,
            throttle: HeaderThrottle::new(config.header_request_interval),
            config,
            events,
            notifications,
            notifications_open: true,
            queries_tx,
            queries_rx,
            state: SyncState::Idle,
        }
    }

    /// Current sync state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Run until the node shuts down.
    pub async fn run(mut self) {
        let shutdown = self.node.shutdown_token();
        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(heartbeat = ?period, "Sync controller started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                event = self.events.recv() => match event {
                    Some(event) => self.handle_node_event(event).await,
                    None => break,
                },

                notification = self.notifications.recv(), if self.notifications_open => {
                    match notification {
                        Ok(notification) => self.handle_notification(notification),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Chain notifications lagged");
                            self.request_headers(false);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            self.notifications_open = false;
                        }
                    }
                }

                Some(result) = self.queries_rx.recv() => self.handle_query_result(result),

                _ = heartbeat.tick() => self.heartbeat(),
            }
        }

        tracing::debug!("Sync controller stopped");
    }

    async fn handle_node_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::PeerConnect(peer) => self.send_version(&peer),
            NodeEvent::Message(peer, message) => self.handle_message(&peer, &message).await,
            NodeEvent::PeerDisconnect(peer) => {
                if self.state.sync_peer() == Some(peer.id()) {
                    self.state = SyncState::Idle;
                }
            }
            NodeEvent::PeerError(peer, error) => {
                tracing::debug!(peer = %peer.id(), error = %error, "Peer error");
            }
            NodeEvent::Send(..) | NodeEvent::Error(..) | NodeEvent::Listening(..) => {}
        }
    }

    fn handle_notification(&mut self, notification: ChainNotification) {
        tracing::debug!(?notification, "Chain notification");
        match notification {
            ChainNotification::Ready | ChainNotification::Relinked => self.request_headers(false),
        }
    }

    async fn handle_message(&mut self, peer: &PeerHandle, message: &Message) {
        match message {
            Message::Version(_) => peer.send(Message::Verack),
            Message::Verack => {}
            Message::Ping(nonce) => peer.send(Message::Pong(*nonce)),
            Message::Headers(headers) => self.handle_headers(peer, headers).await,
            Message::Block(block) => {
                let hash = block.hash();
                if let Err(e) = self.store.add_block_transactions(block.clone()).await {
                    tracing::debug!(peer = %peer.id(), hash = %hash, error = %e, "Block not stored");
                }
            }
            _ => {}
        }
    }

    async fn handle_headers(&mut self, peer: &PeerHandle, headers: &HeadersMessage) {
        tracing::debug!(peer = %peer.id(), count = headers.headers.len(), "Received headers");
        self.state = SyncState::Idle;

        for header in &headers.headers {
            if let Err(e) = self.store.add_block_header(header.clone()).await {
                tracing::debug!(peer = %peer.id(), hash = %header.hash(), error = %e, "Header not stored");
            }
        }

        if !headers.headers.is_empty() {
            self.request_headers(true);
        }
    }

    fn send_version(&self, peer: &PeerHandle) {
        let version = create_version_message(
            self.node.config(),
            self.store.height(),
            peer.addr(),
            self.node.local_address_guess(),
        );
        peer.send(Message::Version(version));
    }

    fn heartbeat(&mut self) {
        if !self.store.is_ready() {
            tracing::trace!("Heartbeat: chain store not ready");
            return;
        }
        if self.state.is_awaiting_headers() {
            tracing::debug!(
                peer = ?self.state.sync_peer(),
                waiting = ?self.state.waiting_for(Instant::now()),
                "Header request outstanding"
            );
        }
        self.request_headers(false);
        self.request_blocks();
        tracing::info!(
            height = self.store.height(),
            peers = self.node.peer_count(),
            "Sync heartbeat"
        );
    }

    /// Ask a random peer for headers following our locator.
    ///
    /// Unforced requests inside the throttle window, a missing peer or a
    /// busy store make this a no-op.
    pub fn request_headers(&mut self, force: bool) {
        if !self.throttle.permits(force, Instant::now()) {
            tracing::trace!("Header request throttled");
            return;
        }
        let Some(peer) = self.node.random_peer() else {
            tracing::debug!("No peer to request headers from");
            return;
        };

        let store = self.store.clone();
        let results = self.queries_tx.clone();
        tokio::spawn(async move {
            let hashes = store.block_locator_hashes().await;
            let _ = results.send(QueryResult::Locator { peer, force, hashes });
        });
    }

    /// Ask a random peer for blocks the store has headers but no data for.
    pub fn request_blocks(&mut self) {
        let Some(peer) = self.node.random_peer() else {
            tracing::debug!("No peer to request blocks from");
            return;
        };

        let store = self.store.clone();
        let results = self.queries_tx.clone();
        let limit = self.config.max_incomplete_blocks;
        tokio::spawn(async move {
            let blocks = store.incomplete_blocks(limit).await;
            let _ = results.send(QueryResult::Incomplete { peer, blocks });
        });
    }

    fn handle_query_result(&mut self, result: QueryResult) {
        match result {
            QueryResult::Locator { peer, force, hashes } => {
                let Some(hashes) = hashes else {
                    tracing::debug!("Chain store busy, skipping header request");
                    return;
                };
                if !self.node.contains(peer.id()) {
                    tracing::debug!(peer = %peer.id(), "Peer left before header request");
                    return;
                }
                let now = Instant::now();
                // Another request may have gone out while the query ran
                if !self.throttle.permits(force, now) {
                    return;
                }

                tracing::debug!(peer = %peer.id(), locator = hashes.len(), force, "Requesting headers");
                peer.send(create_get_headers(self.node.params().protocol_version, hashes));
                self.throttle.record(now);
                self.state = SyncState::AwaitingHeaders {
                    peer: peer.id(),
                    since: now,
                };
            }
            QueryResult::Incomplete { peer, blocks } => {
                if blocks.is_empty() {
                    tracing::trace!("No incomplete blocks");
                    return;
                }
                if !self.node.contains(peer.id()) {
                    tracing::debug!(peer = %peer.id(), "Peer left before block request");
                    return;
                }
                tracing::debug!(peer = %peer.id(), count = blocks.len(), "Requesting blocks");
                for message in create_get_data(&blocks) {
                    peer.send(message);
                }
            }
        }
    }
}
