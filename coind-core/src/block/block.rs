//! Block structure: a header plus opaque transaction data.

use bytes::{Buf, BufMut, Bytes};

use crate::block::BlockHeader;
use crate::crypto::Hash256;
use crate::error::EncodingError;
use crate::serialization::{read_compact_size, write_compact_size, Decodable, Encodable};

/// A full block as carried by the `block` message.
///
/// Transactions are not interpreted; `transactions` holds every byte that
/// follows the transaction count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,

    /// Number of transactions declared by the block.
    pub transaction_count: u64,

    /// Raw encoded transactions.
    pub transactions: Bytes,
}

impl Block {
    /// Get the block hash (delegates to header).
    #[inline]
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }
}

impl Encodable for Block {
    fn consensus_encode<B: BufMut>(&self, buf: &mut B) {
        self.header.consensus_encode(buf);
        write_compact_size(buf, self.transaction_count);
        buf.put_slice(&self.transactions);
    }
}

impl Decodable for Block {
    /// Consumes the rest of `buf`.
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError> {
        let header = BlockHeader::consensus_decode(buf)?;
        let transaction_count = read_compact_size(buf)?;
        let transactions = buf.copy_to_bytes(buf.remaining());
        Ok(Self {
            header,
            transaction_count,
            transactions,
        })
    }
}
