//! Network parameter tables.
//!
//! Each supported network has a fixed set of constants: message magic,
//! protocol version, default port, address prefixes, DNS seeds and the
//! genesis block header.

use std::fmt;
use std::str::FromStr;

use crate::block::BlockHeader;
use crate::crypto::Hash256;

/// Genesis header fields for a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenesisParams {
    /// Block version.
    pub version: i32,
    /// Hash of the genesis header, internal byte order.
    pub hash: Hash256,
    /// Merkle root, internal byte order.
    pub merkle_root: Hash256,
    /// Timestamp.
    pub timestamp: u32,
    /// Compact difficulty target.
    pub bits: u32,
    /// Nonce.
    pub nonce: u32,
}

/// Constants describing one network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    /// Network name (`bitcoin`, `testnet3`, `namecoin`).
    pub name: &'static str,
    /// Short currency symbol, used in the user agent.
    pub symbol: &'static str,
    /// Protocol version advertised in `version` messages.
    pub protocol_version: i32,
    /// Four magic bytes starting every message.
    pub magic: [u8; 4],
    /// Default listening port.
    pub port: u16,
    /// WIF private key prefix.
    pub wif_prefix: u8,
    /// Pay-to-pubkey-hash address prefix.
    pub address_prefix: u8,
    /// Pay-to-script-hash address prefix, if the network defines one.
    pub p2sh_address_prefix: Option<u8>,
    /// DNS seeds as `host:port`.
    pub dns_seeds: &'static [&'static str],
    /// Genesis block.
    pub genesis: GenesisParams,
}

impl NetworkParams {
    /// Build the genesis block header from the table.
    pub fn genesis_header(&self) -> BlockHeader {
        BlockHeader {
            version: self.genesis.version,
            prev_block_hash: Hash256::ZERO,
            merkle_root: self.genesis.merkle_root,
            timestamp: self.genesis.timestamp,
            bits: self.genesis.bits,
            nonce: self.genesis.nonce,
        }
    }

    /// User agent advertised by default: `coind:<symbol>`.
    pub fn default_user_agent(&self) -> String {
        format!("coind:{}", self.symbol)
    }
}

/// Parse 64 hex characters (internal byte order) at compile time.
const fn internal_hash(s: &str) -> Hash256 {
    const fn nibble(c: u8) -> u8 {
        match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => panic!("invalid hex digit"),
        }
    }

    let s = s.as_bytes();
    assert!(s.len() == 64, "hash must be 64 hex digits");
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = (nibble(s[2 * i]) << 4) | nibble(s[2 * i + 1]);
        i += 1;
    }
    Hash256::from_bytes(out)
}

const BITCOIN_MERKLE_ROOT: Hash256 =
    internal_hash("3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a");

/// Bitcoin main network.
pub const BITCOIN: NetworkParams = NetworkParams {
    name: "bitcoin",
    symbol: "btc",
    protocol_version: 70001,
    magic: [0xf9, 0xbe, 0xb4, 0xd9],
    port: 8333,
    wif_prefix: 0x80,
    address_prefix: 0x00,
    p2sh_address_prefix: Some(0x05),
    dns_seeds: &[
        "seed.bitcoin.sipa.be:8333",
        "dnsseed.bluematt.me:8333",
        "dnsseed.bitcoin.dashjr.org:8333",
        "seed.bitcoinstats.com:8333",
        "seed.bitnodes.io:8333",
        "bitseed.xf2.org:8333",
    ],
    genesis: GenesisParams {
        version: 1,
        hash: internal_hash("6fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000"),
        merkle_root: BITCOIN_MERKLE_ROOT,
        timestamp: 1231006505,
        bits: 0x1d00ffff,
        nonce: 2083236893,
    },
};

/// Bitcoin test network, version 3.
pub const TESTNET3: NetworkParams = NetworkParams {
    name: "testnet3",
    symbol: "tbtc",
    protocol_version: 70001,
    magic: [0x0b, 0x11, 0x09, 0x07],
    port: 18333,
    wif_prefix: 0xef,
    address_prefix: 0x6f,
    p2sh_address_prefix: Some(0xc4),
    dns_seeds: &[
        "testnet-seed.alexykot.me:18333",
        "testnet-seed.bitcoin.petertodd.org:18333",
        "testnet-seed.bluematt.me:18333",
        "testnet-seed.bitcoin.schildbach.de:18333",
    ],
    genesis: GenesisParams {
        version: 1,
        hash: internal_hash("43497fd7f826957108f4a30fd9cec3aeba79972084e90ead01ea330900000000"),
        merkle_root: BITCOIN_MERKLE_ROOT,
        timestamp: 1296688602,
        bits: 0x1d00ffff,
        nonce: 414098458,
    },
};

/// Namecoin main network.
pub const NAMECOIN: NetworkParams = NetworkParams {
    name: "namecoin",
    symbol: "nmc",
    protocol_version: 37500,
    magic: [0xf9, 0xbe, 0xb4, 0xfe],
    port: 8334,
    wif_prefix: 0x80,
    address_prefix: 52,
    p2sh_address_prefix: None,
    dns_seeds: &[],
    genesis: GenesisParams {
        version: 1,
        hash: internal_hash("70c7a9f0a2fb3d48e635a70d5b157c807e58c8fb45eb2c5e2cb7620000000000"),
        merkle_root: internal_hash(
            "0dcbd3e6f061215bf3b3383c8ce2ec201bc65acde32595449ac86890bd2dc641",
        ),
        timestamp: 1303000001,
        bits: 0x1c007fff,
        nonce: 2719916434,
    },
};

/// Supported networks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Network {
    /// Bitcoin main network.
    #[default]
    Bitcoin,
    /// Bitcoin testnet3.
    Testnet3,
    /// Namecoin.
    Namecoin,
}

impl Network {
    /// Every supported network.
    pub const ALL: [Network; 3] = [Network::Bitcoin, Network::Testnet3, Network::Namecoin];

    /// Parameter table for this network.
    pub fn params(self) -> &'static NetworkParams {
        match self {
            Network::Bitcoin => &BITCOIN,
            Network::Testnet3 => &TESTNET3,
            Network::Namecoin => &NAMECOIN,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

/// Error returned when parsing an unknown network name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownNetwork(pub String);

impl fmt::Display for UnknownNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown network '{}' (expected bitcoin, testnet3 or namecoin)",
            self.0
        )
    }
}

impl std::error::Error for UnknownNetwork {}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" | "mainnet" => Ok(Network::Bitcoin),
            "testnet3" | "testnet" | "tbtc" => Ok(Network::Testnet3),
            "namecoin" | "nmc" => Ok(Network::Namecoin),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}
