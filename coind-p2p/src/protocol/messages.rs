//! P2P protocol messages.
//!
//! Payload layouts follow the Bitcoin wire protocol. Every message type
//! knows its command name and how to write its payload; reading is done
//! through the decode functions registered in the
//! [`MessageRegistry`](super::MessageRegistry).

use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use coind_core::serialization::{
    read_array, read_compact_size, read_length, read_var_str, write_compact_size, write_var_str,
    ensure_remaining,
};
use coind_core::{Block, BlockHeader, Decodable, Encodable, EncodingError, Hash256};

/// Maximum user agent length in bytes.
pub const MAX_USER_AGENT_LENGTH: usize = 256;

/// Maximum number of block locator hashes in `getheaders`.
pub const MAX_LOCATOR_HASHES: usize = 101;

/// Maximum number of headers in one `headers` message.
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;

/// Maximum number of inventory items in one message.
pub const MAX_INVENTORY_ITEMS: usize = 50_000;

/// A network address as carried in `version`.
///
/// IPv4 addresses travel as IPv4-mapped IPv6; the port is big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddress {
    /// Services offered by the address.
    pub services: u64,
    /// Socket address.
    pub addr: SocketAddr,
}

impl NetAddress {
    /// Create an address with the given services.
    pub fn new(services: u64, addr: SocketAddr) -> Self {
        Self { services, addr }
    }
}

impl Encodable for NetAddress {
    fn consensus_encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.services);
        let ip = match self.addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        buf.put_slice(&ip.octets());
        buf.put_u16(self.addr.port());
    }
}

impl Decodable for NetAddress {
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError> {
        ensure_remaining(buf, 26)?;
        let services = buf.get_u64_le();
        let ip = Ipv6Addr::from(read_array::<_, 16>(buf)?);
        let port = buf.get_u16();
        let ip = match ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(ip),
        };
        Ok(Self {
            services,
            addr: SocketAddr::new(ip, port),
        })
    }
}

/// Version information exchanged during handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    /// Protocol version number.
    pub version: i32,
    /// Services offered by the sender.
    pub services: u64,
    /// Sender's clock, Unix seconds.
    pub timestamp: i64,
    /// The receiver's address as seen by the sender.
    pub addr_recv: NetAddress,
    /// The sender's own address.
    pub addr_from: NetAddress,
    /// Random nonce for self-connection detection.
    pub nonce: u64,
    /// User agent string.
    pub user_agent: String,
    /// Height of the sender's best chain.
    pub start_height: i32,
    /// Whether the sender wants transaction relay.
    pub relay: bool,
}

/// Request for block headers following a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetHeadersMessage {
    /// Protocol version.
    pub version: u32,
    /// Block locator hashes (at exponentially increasing distances).
    pub locator_hashes: Vec<Hash256>,
    /// Stop hash (return headers up to this hash, or as many as allowed if zero).
    pub stop_hash: Hash256,
}

/// Response containing block headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersMessage {
    /// The block headers.
    pub headers: Vec<BlockHeader>,
}

/// Kind of object named by an inventory item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryType {
    /// Ignorable.
    Error,
    /// Transaction.
    Tx,
    /// Full block.
    Block,
    /// Merkle block.
    FilteredBlock,
}

impl InventoryType {
    /// Wire value.
    pub fn code(self) -> u32 {
        match self {
            InventoryType::Error => 0,
            InventoryType::Tx => 1,
            InventoryType::Block => 2,
            InventoryType::FilteredBlock => 3,
        }
    }

    /// Parse a wire value.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(InventoryType::Error),
            1 => Some(InventoryType::Tx),
            2 => Some(InventoryType::Block),
            3 => Some(InventoryType::FilteredBlock),
            _ => None,
        }
    }
}

/// An inventory vector entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryItem {
    /// Object kind.
    pub kind: InventoryType,
    /// Object hash.
    pub hash: Hash256,
}

impl InventoryItem {
    /// Inventory entry for a block.
    pub fn block(hash: Hash256) -> Self {
        Self {
            kind: InventoryType::Block,
            hash,
        }
    }
}

impl Encodable for InventoryItem {
    fn consensus_encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.kind.code());
        self.hash.consensus_encode(buf);
    }
}

impl Decodable for InventoryItem {
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError> {
        ensure_remaining(buf, 36)?;
        let code = buf.get_u32_le();
        let kind = InventoryType::from_code(code)
            .ok_or_else(|| EncodingError::InvalidValue(format!("inventory type {code}")))?;
        Ok(Self {
            kind,
            hash: Hash256::consensus_decode(buf)?,
        })
    }
}

/// All P2P protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    // Handshake messages
    /// Version information sent at start of connection.
    Version(VersionMessage),
    /// Acknowledgment of version message.
    Verack,

    // Keepalive messages
    /// Ping with a nonce.
    Ping(u64),
    /// Pong echoing the nonce.
    Pong(u64),

    // Block sync messages
    /// Request for block headers.
    GetHeaders(GetHeadersMessage),
    /// Response with block headers.
    Headers(HeadersMessage),
    /// Announcement of objects.
    Inv(Vec<InventoryItem>),
    /// Request for objects.
    GetData(Vec<InventoryItem>),
    /// Requested objects that are not available.
    NotFound(Vec<InventoryItem>),
    /// A full block.
    Block(Block),

    /// A message registered as opaque; the payload is kept undecoded.
    Other {
        /// Command name.
        command: String,
        /// Raw payload.
        payload: Bytes,
    },
}

impl Message {
    /// Command name on the wire.
    pub fn command(&self) -> &str {
        match self {
            Message::Version(_) => "version",
            Message::Verack => "verack",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::GetHeaders(_) => "getheaders",
            Message::Headers(_) => "headers",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::NotFound(_) => "notfound",
            Message::Block(_) => "block",
            Message::Other { command, .. } => command.as_str(),
        }
    }

    /// Write the payload (without envelope).
    pub fn encode_payload(&self, buf: &mut BytesMut) {
        match self {
            Message::Version(v) => {
                buf.put_i32_le(v.version);
                buf.put_u64_le(v.services);
                buf.put_i64_le(v.timestamp);
                v.addr_recv.consensus_encode(buf);
                v.addr_from.consensus_encode(buf);
                buf.put_u64_le(v.nonce);
                write_var_str(buf, &v.user_agent);
                buf.put_i32_le(v.start_height);
                buf.put_u8(u8::from(v.relay));
            }
            Message::Verack => {}
            Message::Ping(nonce) | Message::Pong(nonce) => buf.put_u64_le(*nonce),
            Message::GetHeaders(m) => {
                buf.put_u32_le(m.version);
                m.locator_hashes.consensus_encode(buf);
                m.stop_hash.consensus_encode(buf);
            }
            Message::Headers(m) => {
                write_compact_size(buf, m.headers.len() as u64);
                for header in &m.headers {
                    header.consensus_encode(buf);
                    write_compact_size(buf, 0);
                }
            }
            Message::Inv(items) | Message::GetData(items) | Message::NotFound(items) => {
                items.consensus_encode(buf)
            }
            Message::Block(block) => block.consensus_encode(buf),
            Message::Other { payload, .. } => buf.put_slice(payload),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Version(v) => write!(
                f,
                "version(v={}, height={}, ua={})",
                v.version, v.start_height, v.user_agent
            ),
            Message::Ping(nonce) => write!(f, "ping({nonce})"),
            Message::Pong(nonce) => write!(f, "pong({nonce})"),
            Message::GetHeaders(m) => write!(f, "getheaders({} locators)", m.locator_hashes.len()),
            Message::Headers(m) => write!(f, "headers({})", m.headers.len()),
            Message::Inv(items) => write!(f, "inv({})", items.len()),
            Message::GetData(items) => write!(f, "getdata({})", items.len()),
            Message::NotFound(items) => write!(f, "notfound({})", items.len()),
            Message::Block(block) => write!(f, "block({})", block.hash()),
            Message::Other { command, payload } => write!(f, "{}({} bytes)", command, payload.len()),
            Message::Verack => f.write_str("verack"),
        }
    }
}

// Payload decoders. Each consumes as much of `buf` as its layout needs;
// the codec rejects leftovers.

pub(crate) fn decode_version(buf: &mut Bytes) -> Result<Message, EncodingError> {
    ensure_remaining(buf, 20)?;
    let version = buf.get_i32_le();
    let services = buf.get_u64_le();
    let timestamp = buf.get_i64_le();
    let addr_recv = NetAddress::consensus_decode(buf)?;
    let addr_from = NetAddress::consensus_decode(buf)?;
    ensure_remaining(buf, 8)?;
    let nonce = buf.get_u64_le();
    let user_agent = read_var_str(buf, MAX_USER_AGENT_LENGTH as u64)?;
    ensure_remaining(buf, 4)?;
    let start_height = buf.get_i32_le();
    // Relay is absent before protocol 70001.
    let relay = if buf.has_remaining() {
        buf.get_u8() != 0
    } else {
        true
    };
    Ok(Message::Version(VersionMessage {
        version,
        services,
        timestamp,
        addr_recv,
        addr_from,
        nonce,
        user_agent,
        start_height,
        relay,
    }))
}

pub(crate) fn decode_verack(_buf: &mut Bytes) -> Result<Message, EncodingError> {
    Ok(Message::Verack)
}

pub(crate) fn decode_ping(buf: &mut Bytes) -> Result<Message, EncodingError> {
    ensure_remaining(buf, 8)?;
    Ok(Message::Ping(buf.get_u64_le()))
}

pub(crate) fn decode_pong(buf: &mut Bytes) -> Result<Message, EncodingError> {
    ensure_remaining(buf, 8)?;
    Ok(Message::Pong(buf.get_u64_le()))
}

pub(crate) fn decode_getheaders(buf: &mut Bytes) -> Result<Message, EncodingError> {
    ensure_remaining(buf, 4)?;
    let version = buf.get_u32_le();
    let count = read_length(buf, MAX_LOCATOR_HASHES as u64)?;
    ensure_remaining(buf, count * 32)?;
    let locator_hashes = (0..count)
        .map(|_| Hash256::consensus_decode(buf))
        .collect::<Result<Vec<_>, _>>()?;
    let stop_hash = Hash256::consensus_decode(buf)?;
    Ok(Message::GetHeaders(GetHeadersMessage {
        version,
        locator_hashes,
        stop_hash,
    }))
}

pub(crate) fn decode_headers(buf: &mut Bytes) -> Result<Message, EncodingError> {
    let count = read_length(buf, MAX_HEADERS_PER_MESSAGE as u64)?;
    ensure_remaining(buf, count * (BlockHeader::SIZE + 1))?;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        headers.push(BlockHeader::consensus_decode(buf)?);
        let tx_count = read_compact_size(buf)?;
        if tx_count != 0 {
            return Err(EncodingError::InvalidValue(format!(
                "header carries {tx_count} transactions"
            )));
        }
    }
    Ok(Message::Headers(HeadersMessage { headers }))
}

fn decode_inventory(buf: &mut Bytes) -> Result<Vec<InventoryItem>, EncodingError> {
    let count = read_length(buf, MAX_INVENTORY_ITEMS as u64)?;
    ensure_remaining(buf, count * 36)?;
    (0..count).map(|_| InventoryItem::consensus_decode(buf)).collect()
}

pub(crate) fn decode_inv(buf: &mut Bytes) -> Result<Message, EncodingError> {
    decode_inventory(buf).map(Message::Inv)
}

pub(crate) fn decode_getdata(buf: &mut Bytes) -> Result<Message, EncodingError> {
    decode_inventory(buf).map(Message::GetData)
}

pub(crate) fn decode_notfound(buf: &mut Bytes) -> Result<Message, EncodingError> {
    decode_inventory(buf).map(Message::NotFound)
}

pub(crate) fn decode_block(buf: &mut Bytes) -> Result<Message, EncodingError> {
    Block::consensus_decode(buf).map(Message::Block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_version() -> VersionMessage {
        VersionMessage {
            version: 70001,
            services: 1,
            timestamp: 1_700_000_000,
            addr_recv: NetAddress::new(1, "10.0.0.2:8333".parse().unwrap()),
            addr_from: NetAddress::new(1, "[2001:db8::1]:8333".parse().unwrap()),
            nonce: 0x0011_2233_4455_6677,
            user_agent: "coind:btc".to_string(),
            start_height: 42,
            relay: false,
        }
    }

    #[test]
    fn test_net_address_layout() {
        let addr = NetAddress::new(1, "127.0.0.1:8333".parse().unwrap());
        let mut buf = BytesMut::new();
        addr.consensus_encode(&mut buf);
        assert_eq!(buf.len(), 26);
        assert_eq!(&buf[8..20], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff]);
        assert_eq!(&buf[20..24], &[127, 0, 0, 1]);
        // Port is big-endian.
        assert_eq!(&buf[24..], &[0x20, 0x8d]);

        let mut bytes = buf.freeze();
        assert_eq!(NetAddress::consensus_decode(&mut bytes).unwrap(), addr);
    }

    #[test]
    fn test_version_payload() {
        let message = Message::Version(sample_version());
        let mut buf = BytesMut::new();
        message.encode_payload(&mut buf);
        // 4 + 8 + 8 + 26 + 26 + 8 + (1 + 9) + 4 + 1
        assert_eq!(buf.len(), 95);

        let mut bytes = buf.freeze();
        assert_eq!(decode_version(&mut bytes).unwrap(), message);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_version_without_relay() {
        let mut buf = BytesMut::new();
        Message::Version(sample_version()).encode_payload(&mut buf);
        buf.truncate(buf.len() - 1);

        let mut bytes = buf.freeze();
        match decode_version(&mut bytes).unwrap() {
            Message::Version(v) => assert!(v.relay),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_headers_require_zero_tx_count() {
        let header = BlockHeader {
            version: 1,
            prev_block_hash: Hash256::ZERO,
            merkle_root: Hash256::ZERO,
            timestamp: 0,
            bits: 0,
            nonce: 0,
        };
        let mut buf = BytesMut::new();
        write_compact_size(&mut buf, 1);
        header.consensus_encode(&mut buf);
        write_compact_size(&mut buf, 3);

        let mut bytes = buf.freeze();
        assert!(matches!(
            decode_headers(&mut bytes),
            Err(EncodingError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_inventory_rejects_unknown_type() {
        let mut buf = BytesMut::new();
        write_compact_size(&mut buf, 1);
        buf.put_u32_le(9);
        buf.put_slice(&[0u8; 32]);

        let mut bytes = buf.freeze();
        assert!(decode_getdata(&mut bytes).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Message::Verack.to_string(), "verack");
        assert_eq!(Message::Ping(7).to_string(), "ping(7)");
        let inv = Message::GetData(vec![InventoryItem::block(Hash256::ZERO)]);
        assert_eq!(inv.to_string(), "getdata(1)");
        assert_eq!(inv.command(), "getdata");
    }
}
