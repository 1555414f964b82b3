//! Error types for the coind core crate.

use std::fmt;

/// Errors raised while decoding consensus-encoded data.
///
/// Encoding into a buffer cannot fail at this layer; structural limits on
/// whole messages are enforced by the protocol layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodingError {
    /// The input ended before a value was fully read.
    UnexpectedEnd {
        /// Bytes required to read the value.
        needed: usize,
        /// Bytes that were left.
        remaining: usize,
    },
    /// A CompactSize integer used a longer form than necessary.
    NonCanonicalVarInt(u64),
    /// A length prefix exceeds what the decoder accepts.
    LengthTooLarge {
        /// Declared length.
        len: u64,
        /// Maximum accepted length.
        max: u64,
    },
    /// A field held a value outside its domain.
    InvalidValue(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::UnexpectedEnd { needed, remaining } => write!(
                f,
                "unexpected end of data: needed {} bytes, {} remaining",
                needed, remaining
            ),
            EncodingError::NonCanonicalVarInt(value) => {
                write!(f, "non-canonical CompactSize encoding of {}", value)
            }
            EncodingError::LengthTooLarge { len, max } => {
                write!(f, "length {} exceeds maximum {}", len, max)
            }
            EncodingError::InvalidValue(msg) => write!(f, "invalid value: {}", msg),
        }
    }
}

impl std::error::Error for EncodingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EncodingError::UnexpectedEnd { needed: 4, remaining: 1 };
        assert!(e.to_string().contains("needed 4 bytes"));

        let e = EncodingError::LengthTooLarge { len: 10, max: 5 };
        assert_eq!(e.to_string(), "length 10 exceeds maximum 5");
    }
}
