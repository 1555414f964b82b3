//! Block header structure.

use bytes::{Buf, BufMut, BytesMut};

use crate::crypto::{sha256d, Hash256};
use crate::error::EncodingError;
use crate::serialization::{ensure_remaining, Decodable, Encodable};

/// An 80-byte block header.
///
/// The block hash is double SHA-256 of the encoded header; transaction
/// bodies are committed through `merkle_root`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version.
    pub version: i32,

    /// Hash of the previous block header.
    /// All zeros for the genesis block.
    pub prev_block_hash: Hash256,

    /// Merkle root of the block's transactions.
    pub merkle_root: Hash256,

    /// Unix timestamp in seconds.
    pub timestamp: u32,

    /// Compact difficulty target.
    pub bits: u32,

    /// Proof-of-work nonce.
    pub nonce: u32,
}

impl BlockHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 80;

    /// Compute the block hash.
    pub fn hash(&self) -> Hash256 {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.consensus_encode(&mut buf);
        sha256d(&buf)
    }

    /// Check if this header has no parent.
    #[inline]
    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash.is_zero()
    }
}

impl Encodable for BlockHeader {
    fn consensus_encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.version);
        self.prev_block_hash.consensus_encode(buf);
        self.merkle_root.consensus_encode(buf);
        buf.put_u32_le(self.timestamp);
        buf.put_u32_le(self.bits);
        buf.put_u32_le(self.nonce);
    }
}

impl Decodable for BlockHeader {
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError> {
        ensure_remaining(buf, Self::SIZE)?;
        let version = buf.get_i32_le();
        let prev_block_hash = Hash256::consensus_decode(buf)?;
        let merkle_root = Hash256::consensus_decode(buf)?;
        Ok(Self {
            version,
            prev_block_hash,
            merkle_root,
            timestamp: buf.get_u32_le(),
            bits: buf.get_u32_le(),
            nonce: buf.get_u32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_header() -> BlockHeader {
        BlockHeader {
            version: 2,
            prev_block_hash: Hash256::from_bytes([1u8; 32]),
            merkle_root: Hash256::from_bytes([2u8; 32]),
            timestamp: 1_700_000_000,
            bits: 0x1d00ffff,
            nonce: 42,
        }
    }

    #[test]
    fn test_encoded_size() {
        let mut buf = BytesMut::new();
        test_header().consensus_encode(&mut buf);
        assert_eq!(buf.len(), BlockHeader::SIZE);
        assert_eq!(&buf[..4], &[2, 0, 0, 0]);
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        let header = test_header();
        let mut other = header.clone();
        other.nonce += 1;
        assert_ne!(header.hash(), other.hash());
        assert!(!header.is_genesis());
    }

    #[test]
    fn test_decode_short_input() {
        let mut data: &[u8] = &[0u8; 79];
        assert!(matches!(
            BlockHeader::consensus_decode(&mut data),
            Err(EncodingError::UnexpectedEnd { needed: 80, remaining: 79 })
        ));
    }
}
