//! Header index.
//!
//! This module provides:
//! - Header storage indexed by hash
//! - Best chain tracking (longest header chain wins)
//! - An orphan pool for headers whose parent is not known yet
//! - Block locator construction

mod locator;
mod state;
mod stored_header;

pub use locator::{build_block_locator, LOCATOR_DEPTH};
pub use state::{HeaderIndex, InsertOutcome};
pub use stored_header::StoredHeader;
