//! Header request construction and throttling.

use std::time::{Duration, Instant};

use coind_core::Hash256;

use crate::protocol::{GetHeadersMessage, Message, MAX_LOCATOR_HASHES};

/// Build a `getheaders` asking for everything after the locator.
///
/// Locators longer than the protocol allows are cut, keeping the genesis
/// hash last.
pub fn create_get_headers(protocol_version: i32, mut locator: Vec<Hash256>) -> Message {
    if locator.len() > MAX_LOCATOR_HASHES {
        let genesis = locator[locator.len() - 1];
        locator.truncate(MAX_LOCATOR_HASHES - 1);
        locator.push(genesis);
    }
    Message::GetHeaders(GetHeadersMessage {
        version: protocol_version as u32,
        locator_hashes: locator,
        stop_hash: Hash256::ZERO,
    })
}

/// Limits unforced header requests to one per window.
///
/// The window is measured from the last request actually sent.
#[derive(Debug, Clone)]
pub struct HeaderThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl HeaderThrottle {
    /// Create a throttle with the given window.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Whether a request may be sent at `now`.
    pub fn permits(&self, force: bool, now: Instant) -> bool {
        if force {
            return true;
        }
        match self.last_sent {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Record a request sent at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_window() {
        let window = Duration::from_secs(30);
        let mut throttle = HeaderThrottle::new(window);
        let t0 = Instant::now();
        assert!(throttle.permits(false, t0));

        throttle.record(t0);
        assert!(!throttle.permits(false, t0 + Duration::from_secs(29)));
        assert!(throttle.permits(true, t0 + Duration::from_secs(1)));
        assert!(throttle.permits(false, t0 + window));
    }

    #[test]
    fn test_get_headers_locator() {
        let genesis = Hash256::from_bytes([9u8; 32]);
        let msg = create_get_headers(70002, vec![Hash256::ZERO, genesis]);
        match msg {
            Message::GetHeaders(req) => {
                assert_eq!(req.version, 70002);
                assert_eq!(req.locator_hashes, vec![Hash256::ZERO, genesis]);
                assert!(req.stop_hash.is_zero());
            }
            other => panic!("unexpected message: {}", other),
        }
    }

    #[test]
    fn test_long_locator_keeps_genesis() {
        let genesis = Hash256::from_bytes([9u8; 32]);
        let mut locator = vec![Hash256::ZERO; 150];
        locator.push(genesis);

        let Message::GetHeaders(req) = create_get_headers(70002, locator) else {
            panic!("expected getheaders");
        };
        assert_eq!(req.locator_hashes.len(), MAX_LOCATOR_HASHES);
        assert_eq!(req.locator_hashes.last(), Some(&genesis));
    }
}
