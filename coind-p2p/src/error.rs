//! P2P error types.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use coind_core::EncodingError;
use thiserror::Error;

use crate::peer::PeerId;
use crate::protocol::Message;

/// P2P-specific errors.
#[derive(Debug, Error)]
pub enum P2pError {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Connection timed out.
    #[error("Connection timeout to {addr}")]
    ConnectionTimeout { addr: SocketAddr },

    /// Binding the listener failed.
    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A received frame could not be decoded.
    #[error("Failed to decode {} byte frame: {source}", .raw.len())]
    Decode {
        #[source]
        source: DecodeError,
        /// The complete frame, header included.
        raw: Bytes,
    },

    /// A message could not be encoded; nothing was written.
    #[error("Failed to encode {}: {source}", .message.command())]
    Encode {
        #[source]
        source: EncodeError,
        message: Arc<Message>,
    },

    /// A frame header declared a payload above the maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Invalid peer address.
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    /// DNS resolution failed.
    #[error("DNS resolution failed for {host}: {error}")]
    DnsResolutionFailed { host: String, error: String },

    /// Peer not found.
    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    /// Node is shutting down.
    #[error("Node shutting down")]
    Shutdown,
}

/// Errors raised while decoding a framed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame is shorter than a message header.
    #[error("Frame truncated: {len} bytes")]
    Truncated { len: usize },

    /// Invalid network magic bytes.
    #[error("Invalid network magic: expected {expected:02x?}, got {actual:02x?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// The command field is not NUL-padded ASCII.
    #[error("Malformed command field")]
    MalformedCommand,

    /// No decoder is registered for the command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The frame length disagrees with the declared payload length.
    #[error("Length mismatch: header declares {declared} bytes, frame holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Payload checksum does not match.
    #[error("Checksum mismatch: expected {expected:02x?}, got {actual:02x?}")]
    ChecksumMismatch { expected: [u8; 4], actual: [u8; 4] },

    /// The payload is malformed.
    #[error("Invalid {command} payload: {source}")]
    Payload {
        command: String,
        #[source]
        source: EncodingError,
    },

    /// The payload decoded but bytes were left over.
    #[error("{remaining} trailing bytes after {command} payload")]
    TrailingBytes { command: String, remaining: usize },
}

/// Errors raised while encoding a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// User agent longer than the protocol allows.
    #[error("User agent too long: {len} bytes (max: {max})")]
    UserAgentTooLong { len: usize, max: usize },

    /// Too many block locator hashes.
    #[error("Too many locator hashes: {count} (max: {max})")]
    TooManyLocatorHashes { count: usize, max: usize },

    /// Too many headers in one message.
    #[error("Too many headers: {count} (max: {max})")]
    TooManyHeaders { count: usize, max: usize },

    /// Too many inventory items in one message.
    #[error("Too many inventory items: {count} (max: {max})")]
    TooManyInventoryItems { count: usize, max: usize },

    /// Command name longer than 12 bytes or not ASCII.
    #[error("Invalid command name: {0:?}")]
    InvalidCommand(String),

    /// Encoded payload above the maximum.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Result type for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;
