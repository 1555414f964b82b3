//! Per-peer socket tasks.
//!
//! Each connection runs a reader, which owns the receive buffer and framer,
//! and a writer draining the peer's queue of encoded frames.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

use crate::error::{P2pError, P2pResult};
use crate::protocol::{decode_message, Message, MessageFramer, MessageRegistry};

use super::handle::{PeerEvent, PeerHandle};

/// Initial capacity of a peer's receive buffer.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Receive buffer holding bytes that do not yet form a complete message.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    buffer: BytesMut,
    framer: MessageFramer,
}

impl InboundBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            framer: MessageFramer::new(),
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Split off the next complete frame, header included.
    pub fn next_frame(&mut self) -> P2pResult<Option<BytesMut>> {
        self.framer.decode(&mut self.buffer)
    }

    /// Number of buffered bytes not yet framed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }
}

/// Frame and decode every complete message in `inbound`.
///
/// Returns `false` after a fatal framing error; the connection must close.
pub(crate) fn drain_frames(
    peer: &PeerHandle,
    registry: &MessageRegistry,
    magic: [u8; 4],
    inbound: &mut InboundBuffer,
) -> bool {
    loop {
        let frame = match inbound.next_frame() {
            Ok(Some(frame)) => frame.freeze(),
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!(peer = %peer.id(), error = %e, "Fatal framing error");
                peer.emit(PeerEvent::Error {
                    peer: peer.id(),
                    error: Arc::new(e),
                });
                return false;
            }
        };

        match decode_message(&frame, magic, registry) {
            Ok(message) => {
                apply_handshake(peer, &message);
                peer.emit(PeerEvent::Message {
                    peer: peer.id(),
                    message: Arc::new(message),
                });
            }
            Err(source) => {
                tracing::debug!(peer = %peer.id(), error = %source, "Dropping undecodable frame");
                peer.emit(PeerEvent::Error {
                    peer: peer.id(),
                    error: Arc::new(P2pError::Decode { source, raw: frame }),
                });
            }
        }
    }
}

fn apply_handshake(peer: &PeerHandle, message: &Message) {
    peer.update_info(|info| {
        info.record_recv_message();
        match message {
            Message::Version(version) => {
                tracing::debug!(
                    peer = %peer.id(),
                    version = version.version,
                    height = version.start_height,
                    user_agent = %version.user_agent,
                    "Received version"
                );
                info.apply_version(version);
            }
            Message::Verack => info.mark_verack(),
            _ => {}
        }
    });
}

/// Everything a connection task needs besides its socket.
pub(crate) struct Connection {
    pub(crate) peer: PeerHandle,
    pub(crate) outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    pub(crate) registry: Arc<MessageRegistry>,
    pub(crate) magic: [u8; 4],
}

impl Connection {
    /// Dial the peer, then run the connection until it closes.
    pub(crate) async fn run_outbound(self, connect_timeout: Duration) {
        let addr = self.peer.addr();
        let cancel = self.peer.cancel_token().clone();
        tracing::debug!(peer = %self.peer.id(), addr = %addr, "Connecting to peer");

        let result = tokio::select! {
            _ = cancel.cancelled() => None,
            result = timeout(connect_timeout, TcpStream::connect(addr)) => Some(result),
        };

        let stream = match result {
            Some(Ok(Ok(stream))) => stream,
            Some(Ok(Err(e))) => return self.fail(P2pError::Io(e)),
            Some(Err(_)) => return self.fail(P2pError::ConnectionTimeout { addr }),
            None => return self.close(),
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        self.start(stream).await;
    }

    /// Run an accepted connection until it closes.
    pub(crate) async fn run_inbound(self, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %self.peer.addr(), error = %e, "Failed to set TCP_NODELAY");
        }
        self.start(stream).await;
    }

    async fn start(self, stream: TcpStream) {
        tracing::info!(peer = %self.peer.id(), addr = %self.peer.addr(), direction = %self.peer.direction(), "Peer connected");
        self.peer.emit(PeerEvent::Connected { peer: self.peer.id() });

        let Connection {
            peer,
            outbound_rx,
            registry,
            magic,
        } = self;
        let (reader, writer) = stream.into_split();

        let writer_peer = peer.clone();
        let writer_task = tokio::spawn(async move {
            let cancel = writer_peer.cancel_token().clone();
            if let Err(e) = write_loop(writer, outbound_rx, cancel.clone()).await {
                tracing::debug!(peer = %writer_peer.id(), error = %e, "Write failed");
                writer_peer.emit(PeerEvent::Error {
                    peer: writer_peer.id(),
                    error: Arc::new(P2pError::Io(e)),
                });
            }
            cancel.cancel();
        });

        read_loop(&peer, reader, &registry, magic).await;

        peer.disconnect();
        let _ = writer_task.await;
        tracing::info!(peer = %peer.id(), addr = %peer.addr(), "Peer closed");
        peer.emit(PeerEvent::Closed { peer: peer.id() });
    }

    fn fail(self, error: P2pError) {
        tracing::debug!(peer = %self.peer.id(), addr = %self.peer.addr(), error = %error, "Outbound connection failed");
        self.peer.emit(PeerEvent::Error {
            peer: self.peer.id(),
            error: Arc::new(error),
        });
        self.close();
    }

    fn close(self) {
        self.peer.disconnect();
        self.peer.emit(PeerEvent::Closed { peer: self.peer.id() });
    }
}

async fn read_loop(
    peer: &PeerHandle,
    mut reader: OwnedReadHalf,
    registry: &MessageRegistry,
    magic: [u8; 4],
) {
    let cancel = peer.cancel_token().clone();
    let mut inbound = InboundBuffer::new();

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_buf(inbound.buffer_mut()) => read,
        };

        match read {
            Ok(0) => {
                tracing::debug!(peer = %peer.id(), "Remote closed connection");
                break;
            }
            Ok(n) => {
                peer.update_info(|info| info.record_recv_bytes(n as u64));
                if !drain_frames(peer, registry, magic, &mut inbound) {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(peer = %peer.id(), error = %e, "Read failed");
                peer.emit(PeerEvent::Error {
                    peer: peer.id(),
                    error: Arc::new(P2pError::Io(e)),
                });
                break;
            }
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::UnboundedReceiver<Bytes>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            biased;
            frame = frames.recv() => match frame {
                Some(frame) => writer.write_all(&frame).await?,
                None => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
    let _ = writer.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::peer::{ConnectionDirection, PeerId};
    use crate::protocol::encode_message;

    const MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

    fn peer() -> (PeerHandle, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (peer, _frames) = PeerHandle::new(
            PeerId::new(3),
            "127.0.0.1:8333".parse().unwrap(),
            ConnectionDirection::Inbound,
            MAGIC,
            events_tx,
            CancellationToken::new(),
        );
        (peer, events_rx)
    }

    fn frame(message: &Message) -> Bytes {
        encode_message(message, MAGIC).unwrap()
    }

    fn drain_events(rx: &mut mpsc::UnboundedReceiver<PeerEvent>) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_buffer_keeps_partial_frame() {
        let mut inbound = InboundBuffer::new();
        let data = frame(&Message::Ping(1));
        inbound.extend(&data[..10]);
        assert!(inbound.next_frame().unwrap().is_none());
        assert_eq!(inbound.pending(), 10);

        inbound.extend(&data[10..]);
        assert_eq!(inbound.next_frame().unwrap().unwrap().len(), data.len());
        assert_eq!(inbound.pending(), 0);
    }

    #[test]
    fn test_drain_dispatches_in_order() {
        let (peer, mut events) = peer();
        let registry = MessageRegistry::standard();
        let mut inbound = InboundBuffer::new();

        let tail = frame(&Message::Pong(3));
        inbound.extend(&frame(&Message::Ping(1)));
        inbound.extend(&frame(&Message::Ping(2)));
        inbound.extend(&tail[..5]);

        assert!(drain_frames(&peer, &registry, MAGIC, &mut inbound));
        assert_eq!(inbound.pending(), 5);

        let nonces: Vec<_> = drain_events(&mut events)
            .into_iter()
            .map(|event| match event {
                PeerEvent::Message { message, .. } => (*message).clone(),
                other => panic!("unexpected event: {:?}", other),
            })
            .collect();
        assert_eq!(nonces, vec![Message::Ping(1), Message::Ping(2)]);
        assert_eq!(peer.info().messages_recv, 2);
    }

    #[test]
    fn test_malformed_frame_between_valid_ones() {
        let (peer, mut events) = peer();
        let registry = MessageRegistry::standard();
        let mut inbound = InboundBuffer::new();

        let mut bad = BytesMut::from(&frame(&Message::Ping(9))[..]);
        bad[20] ^= 0xff;
        inbound.extend(&frame(&Message::Ping(1)));
        inbound.extend(&bad);
        inbound.extend(&frame(&Message::Ping(2)));

        assert!(drain_frames(&peer, &registry, MAGIC, &mut inbound));
        assert_eq!(inbound.pending(), 0);

        let events = drain_events(&mut events);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], PeerEvent::Message { message, .. } if **message == Message::Ping(1)));
        match &events[1] {
            PeerEvent::Error { error, .. } => match error.as_ref() {
                P2pError::Decode { source, raw } => {
                    assert!(matches!(source, DecodeError::ChecksumMismatch { .. }));
                    assert_eq!(raw.len(), bad.len());
                }
                other => panic!("unexpected error: {:?}", other),
            },
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(&events[2], PeerEvent::Message { message, .. } if **message == Message::Ping(2)));
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let (peer, mut events) = peer();
        let registry = MessageRegistry::standard();
        let mut inbound = InboundBuffer::new();

        let mut header = [0u8; 24];
        header[..4].copy_from_slice(&MAGIC);
        header[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
        inbound.extend(&header);

        assert!(!drain_frames(&peer, &registry, MAGIC, &mut inbound));
        assert!(matches!(
            drain_events(&mut events).as_slice(),
            [PeerEvent::Error { error, .. }] if matches!(**error, P2pError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_handshake_side_effects() {
        let (peer, _events) = peer();
        let registry = MessageRegistry::standard();
        let mut inbound = InboundBuffer::new();

        let config = crate::config::P2pConfig::default();
        let version = crate::protocol::create_version_message(
            &config,
            42,
            "198.51.100.4:8333".parse().unwrap(),
            "203.0.113.1".parse().unwrap(),
        );
        inbound.extend(&frame(&Message::Version(version)));
        inbound.extend(&frame(&Message::Verack));

        assert!(drain_frames(&peer, &registry, MAGIC, &mut inbound));
        let info = peer.info();
        assert_eq!(info.start_height, Some(42));
        assert_eq!(info.user_agent.as_deref(), Some("coind:btc"));
        assert_eq!(info.reported_address, Some("198.51.100.4".parse().unwrap()));
        assert!(info.verack_received);
    }
}
