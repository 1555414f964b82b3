//! P2P configuration.

use std::net::SocketAddr;
use std::time::Duration;

use coind_core::{Network, NetworkParams};

/// Maximum payload size in bytes (32 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Service bit advertised by nodes that serve full blocks.
pub const NODE_NETWORK: u64 = 1;

/// Default connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default heartbeat interval of the sync controller.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum spacing between unforced header requests.
pub const DEFAULT_HEADER_REQUEST_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of blocks requested in one `getdata`.
pub const DEFAULT_MAX_INCOMPLETE_BLOCKS: usize = 20_000;

/// Configuration for the P2P node.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Network whose magic, ports and genesis are used.
    pub network: Network,

    /// Port advertised as `addr_from` in `version` messages.
    ///
    /// The listener binds whatever address it is given; this only tells peers
    /// where to reach us.
    pub listen_port: u16,

    /// Services advertised in `version` messages.
    pub services: u64,

    /// User agent string to send in version messages.
    pub user_agent: String,

    /// Timeout for establishing outbound connections.
    pub connect_timeout: Duration,

    /// Peers dialed by [`NodeHandle::connect_bootstrap_peers`].
    ///
    /// [`NodeHandle::connect_bootstrap_peers`]: crate::NodeHandle::connect_bootstrap_peers
    pub bootstrap_peers: Vec<SocketAddr>,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

impl P2pConfig {
    /// Create a configuration with the network's defaults.
    pub fn new(network: Network) -> Self {
        let params = network.params();
        Self {
            network,
            listen_port: params.port,
            services: NODE_NETWORK,
            user_agent: params.default_user_agent(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            bootstrap_peers: Vec::new(),
        }
    }

    /// Parameter table for the configured network.
    pub fn params(&self) -> &'static NetworkParams {
        self.network.params()
    }

    /// Set the advertised listening port.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Set the advertised services.
    pub fn with_services(mut self, services: u64) -> Self {
        self.services = services;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the bootstrap peers, sorted and without duplicates.
    pub fn with_bootstrap_peers(mut self, mut peers: Vec<SocketAddr>) -> Self {
        peers.sort();
        peers.dedup();
        self.bootstrap_peers = peers;
        self
    }
}

/// Configuration for the sync controller.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between heartbeat ticks.
    pub heartbeat_interval: Duration,

    /// Minimum spacing between unforced header requests.
    pub header_request_interval: Duration,

    /// Maximum number of blocks requested per heartbeat.
    pub max_incomplete_blocks: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            header_request_interval: DEFAULT_HEADER_REQUEST_INTERVAL,
            max_incomplete_blocks: DEFAULT_MAX_INCOMPLETE_BLOCKS,
        }
    }
}

impl SyncConfig {
    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the header request throttle window.
    pub fn with_header_request_interval(mut self, interval: Duration) -> Self {
        self.header_request_interval = interval;
        self
    }

    /// Set the block request limit.
    pub fn with_max_incomplete_blocks(mut self, limit: usize) -> Self {
        self.max_incomplete_blocks = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = P2pConfig::default();
        assert_eq!(config.network, Network::Bitcoin);
        assert_eq!(config.listen_port, 8333);
        assert_eq!(config.services, NODE_NETWORK);
        assert_eq!(config.user_agent, "coind:btc");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_config_builder() {
        let config = P2pConfig::new(Network::Testnet3)
            .with_listen_port(9999)
            .with_user_agent("test/1.0".to_string())
            .with_bootstrap_peers(vec![
                "127.0.0.2:18333".parse().unwrap(),
                "127.0.0.1:18333".parse().unwrap(),
                "127.0.0.2:18333".parse().unwrap(),
            ]);

        assert_eq!(config.listen_port, 9999);
        assert_eq!(config.params().magic, [0x0b, 0x11, 0x09, 0x07]);
        assert_eq!(config.user_agent, "test/1.0");
        assert_eq!(
            config.bootstrap_peers,
            vec![
                "127.0.0.1:18333".parse::<SocketAddr>().unwrap(),
                "127.0.0.2:18333".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_sync_config_defaults() {
        let config = SyncConfig::default()
            .with_heartbeat_interval(Duration::from_millis(50));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(50));
        assert_eq!(config.header_request_interval, Duration::from_secs(30));
        assert_eq!(config.max_incomplete_blocks, 20_000);
    }
}
