//! Command to decoder mapping.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use coind_core::EncodingError;

use super::messages::{self, Message};

/// Decodes a payload into a message.
pub type DecodeFn = fn(&mut Bytes) -> Result<Message, EncodingError>;

/// Commands routinely sent by peers that the node does not act on.
pub const COMMON_OPAQUE_COMMANDS: &[&str] = &[
    "addr", "getaddr", "alert", "tx", "reject", "mempool", "getblocks", "sendheaders",
    "feefilter", "sendcmpct",
];

#[derive(Clone, Copy)]
enum Entry {
    Decode(DecodeFn),
    Opaque,
}

/// The set of commands a node understands.
///
/// Frames whose command is not registered fail to decode.
#[derive(Clone, Default)]
pub struct MessageRegistry {
    entries: HashMap<String, Entry>,
}

impl MessageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing every message in [`Message`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("version", messages::decode_version);
        registry.register("verack", messages::decode_verack);
        registry.register("ping", messages::decode_ping);
        registry.register("pong", messages::decode_pong);
        registry.register("getheaders", messages::decode_getheaders);
        registry.register("headers", messages::decode_headers);
        registry.register("inv", messages::decode_inv);
        registry.register("getdata", messages::decode_getdata);
        registry.register("notfound", messages::decode_notfound);
        registry.register("block", messages::decode_block);
        registry
    }

    /// Register a decoder, replacing any previous one for `command`.
    pub fn register(&mut self, command: &str, decode: DecodeFn) {
        self.entries.insert(command.to_string(), Entry::Decode(decode));
    }

    /// Accept `command` without decoding; it surfaces as [`Message::Other`].
    pub fn register_opaque(&mut self, command: &str) {
        self.entries.insert(command.to_string(), Entry::Opaque);
    }

    /// Forget `command`. Returns whether it was registered.
    pub fn remove(&mut self, command: &str) -> bool {
        self.entries.remove(command).is_some()
    }

    /// Check if `command` is registered.
    pub fn contains(&self, command: &str) -> bool {
        self.entries.contains_key(command)
    }

    /// Decode `payload` as `command`. `None` if the command is unknown.
    pub(crate) fn decode(
        &self,
        command: &str,
        payload: &mut Bytes,
    ) -> Option<Result<Message, EncodingError>> {
        let entry = self.entries.get(command)?;
        Some(match entry {
            Entry::Decode(decode) => decode(payload),
            Entry::Opaque => Ok(Message::Other {
                command: command.to_string(),
                payload: payload.split_off(0),
            }),
        })
    }
}

impl fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        commands.sort_unstable();
        f.debug_struct("MessageRegistry")
            .field("commands", &commands)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = MessageRegistry::standard();
        for command in ["version", "verack", "getheaders", "headers", "getdata", "block"] {
            assert!(registry.contains(command), "missing {command}");
        }
        assert!(!registry.contains("addr"));
    }

    #[test]
    fn test_register_and_remove() {
        let mut registry = MessageRegistry::standard();
        assert!(registry.remove("ping"));
        assert!(!registry.remove("ping"));

        let mut payload = Bytes::new();
        assert!(registry.decode("ping", &mut payload).is_none());

        registry.register_opaque("addr");
        let mut payload = Bytes::from_static(&[1, 2, 3]);
        let message = registry.decode("addr", &mut payload).unwrap().unwrap();
        assert_eq!(
            message,
            Message::Other {
                command: "addr".to_string(),
                payload: Bytes::from_static(&[1, 2, 3]),
            }
        );
        assert!(payload.is_empty());
    }
}
