//! End-to-end tests for the coind node.
//!
//! A scripted remote peer plays the network: the node must announce itself,
//! ask for headers once its store is ready, index what it gets and follow
//! up from the new tip.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use coind_chain::ChainStore;
use coind_core::{BlockHeader, Hash256, Network};
use coind_node::config::NodeConfig;
use coind_node::node::Node;
use coind_p2p::peer::InboundBuffer;
use coind_p2p::protocol::{decode_message, encode_message, HeadersMessage};
use coind_p2p::{Message, MessageRegistry};

const TIMEOUT: Duration = Duration::from_secs(5);

fn test_config(connect: Vec<std::net::SocketAddr>) -> NodeConfig {
    NodeConfig {
        network: Network::Testnet3,
        listen_addr: None,
        connect,
        dns_seeds: false,
        ..NodeConfig::default()
    }
}

struct Remote {
    stream: TcpStream,
    inbound: InboundBuffer,
    registry: MessageRegistry,
    magic: [u8; 4],
}

impl Remote {
    async fn recv(&mut self) -> Message {
        timeout(TIMEOUT, async {
            loop {
                if let Some(frame) = self.inbound.next_frame().unwrap() {
                    return decode_message(&frame, self.magic, &self.registry).unwrap();
                }
                let mut buf = [0u8; 4096];
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "node closed the connection");
                self.inbound.extend(&buf[..n]);
            }
        })
        .await
        .expect("timed out waiting for a message")
    }

    async fn send(&mut self, message: &Message) {
        let frame = encode_message(message, self.magic).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    async fn next_getheaders(&mut self) -> Vec<Hash256> {
        loop {
            if let Message::GetHeaders(request) = self.recv().await {
                return request.locator_hashes;
            }
        }
    }
}

fn children(parent: &BlockHeader, count: usize) -> Vec<BlockHeader> {
    let mut prev = parent.clone();
    (0..count)
        .map(|i| {
            let header = BlockHeader {
                version: 2,
                prev_block_hash: prev.hash(),
                merkle_root: Hash256::from_bytes([i as u8 + 1; 32]),
                timestamp: prev.timestamp + 600,
                bits: prev.bits,
                nonce: i as u32,
            };
            prev = header.clone();
            header
        })
        .collect()
}

#[tokio::test]
async fn test_node_syncs_headers_from_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node = Node::new(test_config(vec![listener.local_addr().unwrap()]));
    let store = node.store();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(node.run(shutdown.clone()));

    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    let params = Network::Testnet3.params();
    let mut remote = Remote {
        stream,
        inbound: InboundBuffer::new(),
        registry: MessageRegistry::standard(),
        magic: params.magic,
    };

    let Message::Version(greeting) = remote.recv().await else {
        panic!("expected version first");
    };
    assert_eq!(greeting.user_agent, "coind:tbtc");

    // Store is ready as soon as peers are dialed: first request is from genesis
    let locator = remote.next_getheaders().await;
    assert_eq!(locator, vec![params.genesis.hash]);

    let headers = children(&params.genesis_header(), 3);
    remote
        .send(&Message::Headers(HeadersMessage { headers: headers.clone() }))
        .await;

    let locator = remote.next_getheaders().await;
    assert_eq!(locator.first(), Some(&headers[2].hash()));
    assert_eq!(locator.last(), Some(&params.genesis.hash));
    assert_eq!(store.height(), 3);

    shutdown.cancel();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_node_answers_version_with_verack() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let node = Node::new(test_config(vec![listener.local_addr().unwrap()]));
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(node.run(shutdown.clone()));

    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    let mut remote = Remote {
        stream,
        inbound: InboundBuffer::new(),
        registry: MessageRegistry::standard(),
        magic: Network::Testnet3.params().magic,
    };

    let Message::Version(mut version) = remote.recv().await else {
        panic!("expected version first");
    };
    version.user_agent = "/remote:0.1/".to_string();
    remote.send(&Message::Version(version)).await;

    loop {
        if remote.recv().await == Message::Verack {
            break;
        }
    }

    shutdown.cancel();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_bind_failure_stops_node() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = NodeConfig {
        listen_addr: Some(taken.local_addr().unwrap()),
        ..test_config(Vec::new())
    };

    let result = timeout(TIMEOUT, Node::new(config).run(CancellationToken::new()))
        .await
        .unwrap();
    assert!(result.is_err());
}
