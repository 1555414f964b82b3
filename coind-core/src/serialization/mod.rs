//! Consensus binary encoding.
//!
//! All multi-byte integers are little-endian. Variable-length data is
//! prefixed with a CompactSize integer:
//! - `< 0xfd`: one byte
//! - `0xfd` + u16, `0xfe` + u32, `0xff` + u64
//!
//! Decoders never panic on short input; they return
//! [`EncodingError::UnexpectedEnd`] instead.

use bytes::{Buf, BufMut};

use crate::crypto::Hash256;
use crate::error::EncodingError;

/// Upper bound accepted for any single length prefix.
pub const MAX_VEC_LENGTH: u64 = 32 * 1024 * 1024;

/// Types that can be written in consensus encoding.
pub trait Encodable {
    /// Append the encoded form to `buf`.
    fn consensus_encode<B: BufMut>(&self, buf: &mut B);
}

/// Types that can be read from consensus encoding.
pub trait Decodable: Sized {
    /// Read one value from the front of `buf`.
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError>;
}

/// Fail unless `buf` holds at least `needed` bytes.
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<(), EncodingError> {
    if buf.remaining() < needed {
        return Err(EncodingError::UnexpectedEnd {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Write a CompactSize integer.
pub fn write_compact_size<B: BufMut>(buf: &mut B, value: u64) {
    match value {
        0..=0xfc => buf.put_u8(value as u8),
        0xfd..=0xffff => {
            buf.put_u8(0xfd);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xffff_ffff => {
            buf.put_u8(0xfe);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(0xff);
            buf.put_u64_le(value);
        }
    }
}

/// Read a CompactSize integer, rejecting non-minimal encodings.
pub fn read_compact_size<B: Buf>(buf: &mut B) -> Result<u64, EncodingError> {
    ensure_remaining(buf, 1)?;
    let value = match buf.get_u8() {
        0xfd => {
            ensure_remaining(buf, 2)?;
            let v = u64::from(buf.get_u16_le());
            if v < 0xfd {
                return Err(EncodingError::NonCanonicalVarInt(v));
            }
            v
        }
        0xfe => {
            ensure_remaining(buf, 4)?;
            let v = u64::from(buf.get_u32_le());
            if v <= 0xffff {
                return Err(EncodingError::NonCanonicalVarInt(v));
            }
            v
        }
        0xff => {
            ensure_remaining(buf, 8)?;
            let v = buf.get_u64_le();
            if v <= 0xffff_ffff {
                return Err(EncodingError::NonCanonicalVarInt(v));
            }
            v
        }
        small => u64::from(small),
    };
    Ok(value)
}

/// Read a CompactSize length and check it against `max`.
pub fn read_length<B: Buf>(buf: &mut B, max: u64) -> Result<usize, EncodingError> {
    let len = read_compact_size(buf)?;
    if len > max {
        return Err(EncodingError::LengthTooLarge { len, max });
    }
    Ok(len as usize)
}

/// Write length-prefixed bytes.
pub fn write_var_bytes<B: BufMut>(buf: &mut B, data: &[u8]) {
    write_compact_size(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Read length-prefixed bytes.
pub fn read_var_bytes<B: Buf>(buf: &mut B, max: u64) -> Result<Vec<u8>, EncodingError> {
    let len = read_length(buf, max)?;
    ensure_remaining(buf, len)?;
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}

/// Write a length-prefixed string.
pub fn write_var_str<B: BufMut>(buf: &mut B, s: &str) {
    write_var_bytes(buf, s.as_bytes());
}

/// Read a length-prefixed string. Invalid UTF-8 is replaced, not rejected;
/// user agents are informational.
pub fn read_var_str<B: Buf>(buf: &mut B, max: u64) -> Result<String, EncodingError> {
    let data = read_var_bytes(buf, max)?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Read a fixed-size byte array.
pub fn read_array<B: Buf, const N: usize>(buf: &mut B) -> Result<[u8; N], EncodingError> {
    ensure_remaining(buf, N)?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

impl Encodable for Hash256 {
    fn consensus_encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.as_bytes());
    }
}

impl Decodable for Hash256 {
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError> {
        Ok(Hash256::from_bytes(read_array(buf)?))
    }
}

impl<T: Encodable> Encodable for Vec<T> {
    fn consensus_encode<B: BufMut>(&self, buf: &mut B) {
        write_compact_size(buf, self.len() as u64);
        for item in self {
            item.consensus_encode(buf);
        }
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn consensus_decode<B: Buf>(buf: &mut B) -> Result<Self, EncodingError> {
        let len = read_length(buf, MAX_VEC_LENGTH)?;
        // Each element takes at least one byte, so a count above the
        // remaining input is malformed before any allocation happens.
        ensure_remaining(buf, len)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::consensus_decode(buf)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_compact_size_boundaries() {
        for (value, len) in [(0u64, 1usize), (0xfc, 1), (0xfd, 3), (0xffff, 3), (0x10000, 5), (0x1_0000_0000, 9)] {
            let mut buf = BytesMut::new();
            write_compact_size(&mut buf, value);
            assert_eq!(buf.len(), len, "length of {}", value);
            let mut bytes = buf.freeze();
            assert_eq!(read_compact_size(&mut bytes).unwrap(), value);
            assert!(bytes.is_empty());
        }
    }

    #[test]
    fn test_non_canonical_rejected() {
        let mut data: &[u8] = &[0xfd, 0x10, 0x00];
        assert_eq!(
            read_compact_size(&mut data),
            Err(EncodingError::NonCanonicalVarInt(0x10))
        );
    }

    #[test]
    fn test_truncated_input() {
        let mut data: &[u8] = &[0xfe, 0x01];
        assert!(matches!(
            read_compact_size(&mut data),
            Err(EncodingError::UnexpectedEnd { needed: 4, remaining: 1 })
        ));
    }

    #[test]
    fn test_var_str_limit() {
        let mut buf = BytesMut::new();
        write_var_str(&mut buf, "/Satoshi:0.8.5/");
        let mut bytes = buf.clone().freeze();
        assert_eq!(read_var_str(&mut bytes, 256).unwrap(), "/Satoshi:0.8.5/");

        let mut bytes = buf.freeze();
        assert!(matches!(
            read_var_str(&mut bytes, 4),
            Err(EncodingError::LengthTooLarge { len: 15, max: 4 })
        ));
    }

    #[test]
    fn test_vec_count_larger_than_input() {
        let mut data: &[u8] = &[0x05, 0x00];
        assert!(Vec::<Hash256>::consensus_decode(&mut data).is_err());
    }
}
