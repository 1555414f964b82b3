//! Command-line argument parsing.

use std::net::SocketAddr;

use clap::Parser;
use coind_core::Network;

/// Bitcoin-family P2P node syncing headers and blocks.
#[derive(Parser, Debug, Clone)]
#[command(name = "coind")]
#[command(about = "Bitcoin-family P2P node: handshake, header sync and block retrieval")]
#[command(version)]
pub struct Cli {
    /// Network to join (bitcoin, testnet3, namecoin).
    #[arg(long, env = "COIND_NETWORK", default_value = "bitcoin")]
    pub network: Network,

    /// P2P listen address. Defaults to all interfaces on the network's port.
    #[arg(long, conflicts_with = "no_listen")]
    pub listen: Option<SocketAddr>,

    /// Do not accept inbound connections.
    #[arg(long)]
    pub no_listen: bool,

    /// Peers to connect to (comma separated or repeated).
    #[arg(long, value_delimiter = ',')]
    pub connect: Vec<SocketAddr>,

    /// Skip resolving the network's DNS seeds.
    #[arg(long)]
    pub no_dns_seeds: bool,

    /// User agent advertised in version messages.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
