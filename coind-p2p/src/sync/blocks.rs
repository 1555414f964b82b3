//! Block data requests.

use coind_chain::IncompleteBlock;

use crate::protocol::{InventoryItem, Message, MAX_INVENTORY_ITEMS};

/// Build `getdata` messages for blocks we have headers but no data for.
///
/// Returns no messages for an empty list and splits lists larger than one
/// message may carry.
pub fn create_get_data(blocks: &[IncompleteBlock]) -> Vec<Message> {
    blocks
        .chunks(MAX_INVENTORY_ITEMS)
        .map(|chunk| {
            Message::GetData(chunk.iter().map(|block| InventoryItem::block(block.hash)).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coind_core::Hash256;
    use crate::protocol::InventoryType;

    fn incomplete(count: usize) -> Vec<IncompleteBlock> {
        (0..count)
            .map(|i| IncompleteBlock {
                hash: Hash256::from_bytes([(i % 256) as u8; 32]),
                height: i as u64 + 1,
            })
            .collect()
    }

    #[test]
    fn test_empty_request() {
        assert!(create_get_data(&[]).is_empty());
    }

    #[test]
    fn test_one_item_per_block() {
        let blocks = incomplete(3);
        let messages = create_get_data(&blocks);
        assert_eq!(messages.len(), 1);
        let Message::GetData(items) = &messages[0] else {
            panic!("expected getdata");
        };
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.kind == InventoryType::Block));
        assert_eq!(items[2].hash, blocks[2].hash);
    }

    #[test]
    fn test_split_above_inventory_limit() {
        let messages = create_get_data(&incomplete(MAX_INVENTORY_ITEMS + 1));
        assert_eq!(messages.len(), 2);
    }
}
