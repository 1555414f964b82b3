//! SHA-256 hashing utilities.

use sha2::{Digest, Sha256};

use super::Hash256;

/// Compute SHA-256 hash of the input data.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 of SHA-256 of the input data.
///
/// Used for block hashes and for the four-byte message checksum.
pub fn sha256d(data: &[u8]) -> Hash256 {
    Hash256::from_bytes(sha256(&sha256(data)))
}
