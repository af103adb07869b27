use std::collections::HashMap;

use swarmchain_core::Block;

/// Counts TLC confirmations per height.
///
/// Confirmations for heights the node has not reached yet are buffered,
/// so a node that falls behind can commit several heights in a row once
/// it catches up.
#[derive(Debug)]
pub struct TlcTracker {
    majority: u64,
    counts: HashMap<u64, u64>,
    blocks: HashMap<u64, Block>,
}

impl TlcTracker {
    pub fn new(majority: u64) -> Self {
        TlcTracker {
            majority,
            counts: HashMap::new(),
            blocks: HashMap::new(),
        }
    }

    /// Record one confirmation for the block's height. All confirmations
    /// for a height carry the same decided block, so the first one seen
    /// is kept.
    pub fn record(&mut self, value: Block) {
        let height = value.block_number;
        self.blocks.entry(height).or_insert(value);
        *self.counts.entry(height).or_insert(0) += 1;
    }

    pub fn has_majority(&self, height: u64) -> bool {
        self.counts
            .get(&height)
            .is_some_and(|count| *count >= self.majority)
    }

    /// Remove and return the block confirmed at `height`.
    pub fn take(&mut self, height: u64) -> Option<Block> {
        self.counts.remove(&height);
        self.blocks.remove(&height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmchain_core::BlockContent;

    fn block_at(height: u64) -> Block {
        Block::next(
            height,
            swarmchain_core::Hash::ZERO,
            BlockContent::Naming {
                metahash: vec![height as u8],
                filename: format!("file{}.txt", height),
            },
        )
    }

    #[test]
    fn test_majority_reached_at_threshold() {
        let mut tlc = TlcTracker::new(3);
        tlc.record(block_at(0));
        tlc.record(block_at(0));
        assert!(!tlc.has_majority(0));
        tlc.record(block_at(0));
        assert!(tlc.has_majority(0));
    }

    #[test]
    fn test_heights_counted_independently() {
        let mut tlc = TlcTracker::new(2);
        tlc.record(block_at(0));
        tlc.record(block_at(1));
        tlc.record(block_at(1));
        assert!(!tlc.has_majority(0));
        assert!(tlc.has_majority(1));
    }

    #[test]
    fn test_take_clears_the_height() {
        let mut tlc = TlcTracker::new(1);
        tlc.record(block_at(2));
        assert!(tlc.has_majority(2));
        let taken = tlc.take(2).unwrap();
        assert_eq!(taken.block_number, 2);
        assert!(!tlc.has_majority(2));
        assert!(tlc.take(2).is_none());
    }
}
