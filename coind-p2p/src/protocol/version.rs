//! Version message construction.
//!
//! The handshake protocol:
//! 1. Both sides send a `version` message
//! 2. Upon receiving `version`, the receiver replies with `verack`
//! 3. Each side records the remote's identity from the `version` it got

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::SystemTime;

use rand::Rng;

use crate::config::P2pConfig;
use crate::protocol::{NetAddress, VersionMessage};

/// Generate a fresh nonce for self-connection detection.
pub fn random_nonce() -> u64 {
    rand::thread_rng().gen()
}

/// Create a version message for handshake.
///
/// `addr_recv` is the remote peer's address, `local_ip` is our best guess
/// of how the remote sees us.
pub fn create_version_message(
    config: &P2pConfig,
    start_height: u64,
    addr_recv: SocketAddr,
    local_ip: IpAddr,
) -> VersionMessage {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    VersionMessage {
        version: config.params().protocol_version,
        services: config.services,
        timestamp,
        addr_recv: NetAddress::new(config.services, addr_recv),
        addr_from: NetAddress::new(config.services, SocketAddr::new(local_ip, config.listen_port)),
        nonce: random_nonce(),
        user_agent: config.user_agent.clone(),
        start_height: i32::try_from(start_height).unwrap_or(i32::MAX),
        relay: true,
    }
}

/// The greeting a peer sends as soon as its connection is usable.
///
/// It carries no chain height; the sync controller follows up with its
/// own `version` once the node announces the peer.
pub fn create_greeting(config: &P2pConfig, addr_recv: SocketAddr) -> VersionMessage {
    create_version_message(config, 0, addr_recv, IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coind_core::Network;

    #[test]
    fn test_version_fields() {
        let config = P2pConfig::new(Network::Namecoin);
        let remote: SocketAddr = "192.0.2.7:8334".parse().unwrap();
        let msg = create_version_message(&config, 1234, remote, "198.51.100.1".parse().unwrap());

        assert_eq!(msg.version, 37500);
        assert_eq!(msg.start_height, 1234);
        assert_eq!(msg.user_agent, "coind:nmc");
        assert_eq!(msg.addr_recv.addr, remote);
        assert_eq!(msg.addr_from.addr, "198.51.100.1:8334".parse().unwrap());
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_addr_from_uses_advertised_port() {
        let config = P2pConfig::new(Network::Bitcoin).with_listen_port(18444);
        let remote: SocketAddr = "192.0.2.7:8333".parse().unwrap();

        let msg = create_version_message(&config, 0, remote, "203.0.113.9".parse().unwrap());
        assert_eq!(msg.addr_from.addr, "203.0.113.9:18444".parse().unwrap());

        let greeting = create_greeting(&config, remote);
        assert_eq!(greeting.addr_from.addr, "0.0.0.0:18444".parse().unwrap());
    }

    #[test]
    fn test_nonces_differ() {
        let config = P2pConfig::default();
        let remote: SocketAddr = "192.0.2.7:8333".parse().unwrap();
        let a = create_greeting(&config, remote);
        let b = create_greeting(&config, remote);
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.start_height, 0);
    }
}
