//! Sync state tracking.

use std::time::{Duration, Instant};

use crate::peer::PeerId;

/// Current sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No header request outstanding.
    #[default]
    Idle,
    /// A `getheaders` was sent and no `headers` has arrived yet.
    AwaitingHeaders {
        /// Peer the request went to.
        peer: PeerId,
        /// When the request was sent.
        since: Instant,
    },
}

impl SyncState {
    /// Check if a header request is outstanding.
    pub fn is_awaiting_headers(&self) -> bool {
        matches!(self, SyncState::AwaitingHeaders { .. })
    }

    /// Peer asked for headers, if any.
    pub fn sync_peer(&self) -> Option<PeerId> {
        match self {
            SyncState::AwaitingHeaders { peer, .. } => Some(*peer),
            SyncState::Idle => None,
        }
    }

    /// How long the outstanding request has been waiting.
    pub fn waiting_for(&self, now: Instant) -> Option<Duration> {
        match self {
            SyncState::AwaitingHeaders { since, .. } => Some(now.saturating_duration_since(*since)),
            SyncState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_state() {
        let state = SyncState::default();
        assert!(!state.is_awaiting_headers());
        assert_eq!(state.sync_peer(), None);

        let since = Instant::now();
        let state = SyncState::AwaitingHeaders {
            peer: PeerId::new(4),
            since,
        };
        assert!(state.is_awaiting_headers());
        assert_eq!(state.sync_peer(), Some(PeerId::new(4)));
        assert_eq!(
            state.waiting_for(since + Duration::from_secs(3)),
            Some(Duration::from_secs(3))
        );
    }
}
