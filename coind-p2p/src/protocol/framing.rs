//! Message envelope framing.
//!
//! Messages are framed as:
//! - 4 bytes: network magic
//! - 12 bytes: command, ASCII, NUL padded
//! - 4 bytes: little-endian payload length
//! - 4 bytes: first four bytes of double SHA-256 of the payload
//! - N bytes: payload

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{P2pError, P2pResult};

/// Header size: magic + command + length + checksum.
pub const HEADER_SIZE: usize = 24;

/// Size of the command field.
pub const COMMAND_SIZE: usize = 12;

/// Payload length declared by a header. `buf` must hold a full header.
fn declared_length(buf: &[u8]) -> usize {
    let mut len = [0u8; 4];
    len.copy_from_slice(&buf[16..20]);
    u32::from_le_bytes(len) as usize
}

/// Length of the first complete message in `buf`, if one is present.
///
/// Only the length field is inspected; magic, command and checksum are
/// checked when the frame is decoded.
pub fn detect_message_boundary(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    let total = HEADER_SIZE + declared_length(buf);
    (buf.len() >= total).then_some(total)
}

/// Splits complete frames off an accumulating receive buffer.
///
/// Yields whole frames, header included. A header declaring a payload
/// above [`MAX_PAYLOAD_SIZE`] is an error: the buffer would otherwise grow
/// without bound waiting for it.
#[derive(Debug, Default)]
pub struct MessageFramer;

impl MessageFramer {
    /// Create a new framer.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MessageFramer {
    type Item = BytesMut;
    type Error = P2pError;

    fn decode(&mut self, src: &mut BytesMut) -> P2pResult<Option<Self::Item>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let length = declared_length(src);
        if length > MAX_PAYLOAD_SIZE {
            return Err(P2pError::FrameTooLarge {
                size: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        match detect_message_boundary(src) {
            Some(total) => Ok(Some(src.split_to(total))),
            None => {
                // Reserve space for the full message to avoid reallocations
                src.reserve(HEADER_SIZE + length - src.len());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn frame(payload_len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[16..20].copy_from_slice(&(payload_len as u32).to_le_bytes());
        buf.extend(std::iter::repeat(0xab).take(payload_len));
        buf
    }

    #[test]
    fn test_boundary_partial_header() {
        assert_eq!(detect_message_boundary(&[0u8; 23]), None);
    }

    #[test]
    fn test_boundary_partial_payload() {
        let full = frame(10);
        assert_eq!(detect_message_boundary(&full[..30]), None);
        assert_eq!(detect_message_boundary(&full), Some(34));
    }

    #[test]
    fn test_boundary_ignores_trailing_bytes() {
        let mut data = frame(0);
        data.extend_from_slice(&frame(5)[..10]);
        assert_eq!(detect_message_boundary(&data), Some(HEADER_SIZE));
    }

    #[test]
    fn test_framer_splits_frames() {
        let mut framer = MessageFramer::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&frame(3));
        buf.put_slice(&frame(0));
        buf.put_slice(&frame(7)[..5]);

        assert_eq!(framer.decode(&mut buf).unwrap().unwrap().len(), 27);
        assert_eq!(framer.decode(&mut buf).unwrap().unwrap().len(), 24);
        assert!(framer.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_frame_too_large() {
        let mut framer = MessageFramer::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&[0u8; 16]);
        buf.put_u32_le((MAX_PAYLOAD_SIZE + 1) as u32);
        buf.put_slice(&[0u8; 4]);

        let result = framer.decode(&mut buf);
        assert!(matches!(result, Err(P2pError::FrameTooLarge { .. })));
    }
}
