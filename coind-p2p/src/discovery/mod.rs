//! Peer discovery through the network's DNS seeds.

pub mod dns;

pub use dns::{bootstrap_addresses, DnsResolver};
