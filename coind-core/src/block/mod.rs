//! Block and header types.

#[allow(clippy::module_inception)]
mod block;
mod header;

pub use block::Block;
pub use header::BlockHeader;
