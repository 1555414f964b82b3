//! Block locator construction.

use coind_core::Hash256;

/// Maximum number of block locator hashes.
pub const LOCATOR_DEPTH: usize = 32;

/// Build a block locator from the main chain, indexed by height.
///
/// Returns hashes at exponentially increasing distances from the tip:
/// - tip, tip-1, ..., tip-9, tip-11, tip-15, tip-23, ... genesis
///
/// The last entry is always genesis.
pub fn build_block_locator(main_chain: &[Hash256]) -> Vec<Hash256> {
    let mut locator = Vec::with_capacity(LOCATOR_DEPTH);
    let Some(&genesis) = main_chain.first() else {
        return locator;
    };

    let mut height = main_chain.len() as u64 - 1;
    let mut step = 1u64;

    loop {
        locator.push(main_chain[height as usize]);

        if height == 0 {
            break;
        }

        // Increase step exponentially after first 10
        if locator.len() >= 10 {
            step *= 2;
        }

        height = height.saturating_sub(step);

        // Leave room for genesis
        if locator.len() >= LOCATOR_DEPTH - 1 {
            break;
        }
    }

    // Always include genesis
    if locator.last() != Some(&genesis) {
        locator.push(genesis);
    }

    locator
}
