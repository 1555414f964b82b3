//! Hashing primitives.
//!
//! Block hashes and message checksums are double SHA-256, stored in
//! internal (little-endian) byte order and displayed reversed.

mod hash;
mod hashing;

pub use hash::Hash256;
pub use hashing::{sha256, sha256d};
