//! coind node library.
//!
//! This library provides the components for building and running a coind
//! node. It is used by the `coind` binary and can also be used for testing
//! and embedding.

pub mod cli;
pub mod config;
pub mod node;
pub mod shutdown;
