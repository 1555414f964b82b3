//! Node configuration.

use std::net::{Ipv4Addr, SocketAddr};

use coind_core::Network;
use coind_p2p::{P2pConfig, SyncConfig};

use crate::cli::Cli;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Network to join.
    pub network: Network,

    /// P2P listen address, `None` to stay outbound only.
    pub listen_addr: Option<SocketAddr>,

    /// Peers to connect to on startup.
    pub connect: Vec<SocketAddr>,

    /// Whether to resolve the network's DNS seeds.
    pub dns_seeds: bool,

    /// User agent override.
    pub user_agent: Option<String>,

    /// Sync controller settings.
    pub sync: SyncConfig,

    /// Filter directives for the log subscriber, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl NodeConfig {
    /// Create a node configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> Self {
        let listen_addr = if cli.no_listen {
            None
        } else {
            Some(cli.listen.unwrap_or_else(|| default_listen_addr(cli.network)))
        };

        Self {
            network: cli.network,
            listen_addr,
            connect: cli.connect.clone(),
            dns_seeds: !cli.no_dns_seeds,
            user_agent: cli.user_agent.clone(),
            sync: SyncConfig::default(),
            log_level: cli.log_level.clone(),
        }
    }

    /// Build P2P configuration from node config.
    pub fn p2p_config(&self) -> P2pConfig {
        let mut config = P2pConfig::new(self.network).with_bootstrap_peers(self.connect.clone());

        if let Some(addr) = self.listen_addr {
            config = config.with_listen_port(addr.port());
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }

        config
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        let network = Network::default();
        Self {
            network,
            listen_addr: Some(default_listen_addr(network)),
            connect: Vec::new(),
            dns_seeds: true,
            user_agent: None,
            sync: SyncConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

fn default_listen_addr(network: Network) -> SocketAddr {
    SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), network.params().port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.listen_addr.unwrap().port(), 8333);
        assert!(config.dns_seeds);
        assert!(config.connect.is_empty());
    }

    #[test]
    fn test_from_cli_uses_network_port() {
        let cli = Cli::parse_from(["coind", "--network", "testnet3", "--no-dns-seeds"]);
        let config = NodeConfig::from_cli(&cli);
        assert_eq!(config.listen_addr, Some("0.0.0.0:18333".parse().unwrap()));
        assert!(!config.dns_seeds);

        let p2p = config.p2p_config();
        assert_eq!(p2p.listen_port, 18333);
        assert_eq!(p2p.user_agent, "coind:tbtc");
    }

    #[test]
    fn test_p2p_config_overrides() {
        let cli = Cli::parse_from([
            "coind",
            "--no-listen",
            "--connect",
            "127.0.0.1:8333",
            "--user-agent",
            "/custom:1.0/",
        ]);
        let config = NodeConfig::from_cli(&cli);
        assert!(config.listen_addr.is_none());

        let p2p = config.p2p_config();
        assert_eq!(p2p.listen_port, 8333);
        assert_eq!(p2p.user_agent, "/custom:1.0/");
        assert_eq!(p2p.bootstrap_peers, vec!["127.0.0.1:8333".parse().unwrap()]);
    }

    #[test]
    fn test_log_level_from_cli() {
        assert_eq!(NodeConfig::from_cli(&Cli::parse_from(["coind"])).log_level, "info");

        let cli = Cli::parse_from(["coind", "--log-level", "coind_p2p=trace,warn"]);
        assert_eq!(NodeConfig::from_cli(&cli).log_level, "coind_p2p=trace,warn");
    }
}
