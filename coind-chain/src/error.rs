//! Chain error types.

use std::fmt;

use coind_core::Hash256;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors that can occur while updating the chain store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainError {
    /// A header with no parent that is not this network's genesis.
    GenesisMismatch { expected: Hash256, actual: Hash256 },

    /// The orphan pool is full; the header was dropped.
    TooManyOrphans { limit: usize },

    /// Block data arrived for a header that cannot be linked.
    UnknownBlock { hash: Hash256 },
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::GenesisMismatch { expected, actual } => {
                write!(f, "genesis mismatch: expected {expected}, got {actual}")
            }
            ChainError::TooManyOrphans { limit } => {
                write!(f, "orphan pool full ({limit} headers)")
            }
            ChainError::UnknownBlock { hash } => {
                write!(f, "block data for unknown header {hash}")
            }
        }
    }
}

impl std::error::Error for ChainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChainError::TooManyOrphans { limit: 5 };
        assert_eq!(err.to_string(), "orphan pool full (5 headers)");

        let err = ChainError::UnknownBlock { hash: Hash256::ZERO };
        assert!(err.to_string().contains("unknown header"));
    }
}
