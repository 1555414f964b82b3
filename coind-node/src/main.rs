//! coind node binary.
//!
//! Joins a Bitcoin-family network, completes handshakes and keeps an
//! in-memory header index in sync with its peers.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use coind_node::cli::Cli;
use coind_node::config::NodeConfig;
use coind_node::node::Node;
use coind_node::shutdown::cancel_on_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let config = NodeConfig::from_cli(&Cli::parse_args());

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::info!("coind v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    // Create and run node
    Node::new(config).run(shutdown).await
}
