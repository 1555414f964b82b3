//! Whole-message encoding and decoding.

use bytes::{BufMut, Bytes, BytesMut};
use coind_core::sha256d;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{DecodeError, EncodeError};

use super::framing::{COMMAND_SIZE, HEADER_SIZE};
use super::messages::{
    Message, MAX_HEADERS_PER_MESSAGE, MAX_INVENTORY_ITEMS, MAX_LOCATOR_HASHES,
    MAX_USER_AGENT_LENGTH,
};
use super::registry::MessageRegistry;

/// Reject messages that peers would refuse.
fn check_limits(message: &Message) -> Result<(), EncodeError> {
    match message {
        Message::Version(v) if v.user_agent.len() > MAX_USER_AGENT_LENGTH => {
            Err(EncodeError::UserAgentTooLong {
                len: v.user_agent.len(),
                max: MAX_USER_AGENT_LENGTH,
            })
        }
        Message::GetHeaders(m) if m.locator_hashes.len() > MAX_LOCATOR_HASHES => {
            Err(EncodeError::TooManyLocatorHashes {
                count: m.locator_hashes.len(),
                max: MAX_LOCATOR_HASHES,
            })
        }
        Message::Headers(m) if m.headers.len() > MAX_HEADERS_PER_MESSAGE => {
            Err(EncodeError::TooManyHeaders {
                count: m.headers.len(),
                max: MAX_HEADERS_PER_MESSAGE,
            })
        }
        Message::Inv(items) | Message::GetData(items) | Message::NotFound(items)
            if items.len() > MAX_INVENTORY_ITEMS =>
        {
            Err(EncodeError::TooManyInventoryItems {
                count: items.len(),
                max: MAX_INVENTORY_ITEMS,
            })
        }
        _ => Ok(()),
    }
}

/// Encode `message` into a complete frame for the network with `magic`.
pub fn encode_message(message: &Message, magic: [u8; 4]) -> Result<Bytes, EncodeError> {
    let command = message.command();
    if command.is_empty() || command.len() > COMMAND_SIZE || !command.is_ascii() {
        return Err(EncodeError::InvalidCommand(command.to_string()));
    }
    check_limits(message)?;

    let mut payload = BytesMut::new();
    message.encode_payload(&mut payload);
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(EncodeError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let checksum = sha256d(&payload);
    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_slice(&magic);
    let mut command_field = [0u8; COMMAND_SIZE];
    command_field[..command.len()].copy_from_slice(command.as_bytes());
    frame.put_slice(&command_field);
    frame.put_u32_le(payload.len() as u32);
    frame.put_slice(&checksum.as_bytes()[..4]);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Parse the NUL-padded command field.
fn parse_command(field: &[u8]) -> Result<&str, DecodeError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if end == 0 || field[end..].iter().any(|&b| b != 0) {
        return Err(DecodeError::MalformedCommand);
    }
    let command = &field[..end];
    if !command.iter().all(|b| b.is_ascii_graphic()) {
        return Err(DecodeError::MalformedCommand);
    }
    std::str::from_utf8(command).map_err(|_| DecodeError::MalformedCommand)
}

/// Decode one complete frame.
///
/// Verifies magic, length, checksum and command, then requires the payload
/// decoder to consume the whole payload.
pub fn decode_message(
    frame: &[u8],
    magic: [u8; 4],
    registry: &MessageRegistry,
) -> Result<Message, DecodeError> {
    if frame.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated { len: frame.len() });
    }

    let mut actual_magic = [0u8; 4];
    actual_magic.copy_from_slice(&frame[..4]);
    if actual_magic != magic {
        return Err(DecodeError::InvalidMagic {
            expected: magic,
            actual: actual_magic,
        });
    }

    let command = parse_command(&frame[4..16])?;

    let mut len = [0u8; 4];
    len.copy_from_slice(&frame[16..20]);
    let declared = u32::from_le_bytes(len) as usize;
    let payload = &frame[HEADER_SIZE..];
    if payload.len() != declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    let mut expected = [0u8; 4];
    expected.copy_from_slice(&frame[20..24]);
    let digest = sha256d(payload);
    let mut actual = [0u8; 4];
    actual.copy_from_slice(&digest.as_bytes()[..4]);
    if actual != expected {
        return Err(DecodeError::ChecksumMismatch { expected, actual });
    }

    let mut payload = Bytes::copy_from_slice(payload);
    let message = registry
        .decode(command, &mut payload)
        .ok_or_else(|| DecodeError::UnknownCommand(command.to_string()))?
        .map_err(|source| DecodeError::Payload {
            command: command.to_string(),
            source,
        })?;

    if !payload.is_empty() {
        return Err(DecodeError::TrailingBytes {
            command: command.to_string(),
            remaining: payload.len(),
        });
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GetHeadersMessage, HeadersMessage, InventoryItem};
    use coind_core::Hash256;

    const MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

    #[test]
    fn test_verack_frame_bytes() {
        let frame = encode_message(&Message::Verack, MAGIC).unwrap();
        assert_eq!(
            hex::encode(&frame),
            "f9beb4d976657261636b000000000000000000005df6e0e2"
        );
    }

    #[test]
    fn test_decode_ping() {
        let registry = MessageRegistry::standard();
        let frame = encode_message(&Message::Ping(99), MAGIC).unwrap();
        assert_eq!(decode_message(&frame, MAGIC, &registry).unwrap(), Message::Ping(99));
    }

    #[test]
    fn test_wrong_magic() {
        let registry = MessageRegistry::standard();
        let frame = encode_message(&Message::Verack, [0x0b, 0x11, 0x09, 0x07]).unwrap();
        assert!(matches!(
            decode_message(&frame, MAGIC, &registry),
            Err(DecodeError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_bad_checksum() {
        let registry = MessageRegistry::standard();
        let mut frame = encode_message(&Message::Ping(1), MAGIC).unwrap().to_vec();
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        assert!(matches!(
            decode_message(&frame, MAGIC, &registry),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_command() {
        let registry = MessageRegistry::standard();
        let frame = encode_message(
            &Message::Other {
                command: "addr".to_string(),
                payload: Bytes::new(),
            },
            MAGIC,
        )
        .unwrap();
        assert_eq!(
            decode_message(&frame, MAGIC, &registry),
            Err(DecodeError::UnknownCommand("addr".to_string()))
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let registry = MessageRegistry::standard();
        let frame = encode_message(
            &Message::Other {
                command: "verack".to_string(),
                payload: Bytes::from_static(&[0]),
            },
            MAGIC,
        )
        .unwrap();
        assert!(matches!(
            decode_message(&frame, MAGIC, &registry),
            Err(DecodeError::TrailingBytes { remaining: 1, .. })
        ));
    }

    #[test]
    fn test_structural_limits() {
        let getheaders = Message::GetHeaders(GetHeadersMessage {
            version: 70001,
            locator_hashes: vec![Hash256::ZERO; MAX_LOCATOR_HASHES + 1],
            stop_hash: Hash256::ZERO,
        });
        assert!(matches!(
            encode_message(&getheaders, MAGIC),
            Err(EncodeError::TooManyLocatorHashes { count: 102, .. })
        ));

        let headers = Message::Headers(HeadersMessage {
            headers: vec![
                coind_core::Network::Bitcoin.params().genesis_header();
                MAX_HEADERS_PER_MESSAGE + 1
            ],
        });
        assert!(matches!(
            encode_message(&headers, MAGIC),
            Err(EncodeError::TooManyHeaders { .. })
        ));

        let getdata = Message::GetData(vec![InventoryItem::block(Hash256::ZERO); MAX_INVENTORY_ITEMS + 1]);
        assert!(matches!(
            encode_message(&getdata, MAGIC),
            Err(EncodeError::TooManyInventoryItems { .. })
        ));
    }

    #[test]
    fn test_invalid_command_name() {
        let message = Message::Other {
            command: "averyveryverylongcommand".to_string(),
            payload: Bytes::new(),
        };
        assert!(matches!(
            encode_message(&message, MAGIC),
            Err(EncodeError::InvalidCommand(_))
        ));
    }
}
