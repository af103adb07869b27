use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use swarmchain_core::{Block, BlockContent, ExtraMessage, Hash};

use crate::broadcast::Broadcaster;
use crate::paxos::Paxos;
use crate::tlc::TlcTracker;

/// The forkless chain of decided blocks and the Paxos machinery that
/// grows it.
///
/// Exactly one Paxos instance is open at a time, for the next height.
/// When TLC confirmations reach a majority the decided block is
/// appended and the next instance opens. Driven from a single task, so
/// no internal locking.
pub struct Blockchain<B: Broadcaster> {
    node_index: u64,
    num_participants: u64,
    retry_period: Duration,
    broadcaster: B,
    height: u64,
    tail: Hash,
    blocks: HashMap<String, Block>,
    tlc: TlcTracker,
    paxos: Paxos<B>,
    proposer: Option<JoinHandle<()>>,
}

impl<B: Broadcaster> Blockchain<B> {
    pub fn new(
        node_index: u64,
        num_participants: u64,
        retry_period: Duration,
        broadcaster: B,
    ) -> Self {
        let majority = num_participants / 2 + 1;
        let paxos = Paxos::new(0, node_index, num_participants, retry_period, broadcaster.clone());
        Blockchain {
            node_index,
            num_participants,
            retry_period,
            broadcaster,
            height: 0,
            tail: Hash::ZERO,
            blocks: HashMap::new(),
            tlc: TlcTracker::new(majority),
            paxos,
            proposer: None,
        }
    }

    /// Next height to be decided.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Hash of the last committed block, hex encoded (all zeros before
    /// the first commit).
    pub fn tail_hex(&self) -> String {
        self.tail.to_hex()
    }

    /// The committed blocks, keyed by hex block hash, plus the tail.
    pub fn get_blocks(&self) -> (String, HashMap<String, Block>) {
        (self.tail_hex(), self.blocks.clone())
    }

    /// Whether a proposal of ours is in flight for the open instance.
    pub fn proposing(&self) -> bool {
        self.proposer.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wrap `content` in a block extending the current tail and start
    /// proposing it. One proposal per open instance; a second call
    /// before the instance closes is ignored.
    pub fn propose_content(&mut self, content: BlockContent) {
        if self.proposing() {
            debug!(height = self.height, "proposal already in flight");
            return;
        }
        let block = if self.height == 0 {
            Block::genesis(content)
        } else {
            Block::next(self.height, self.tail, content)
        };
        info!(height = self.height, kind = block.content.kind(), "proposing block");
        self.proposer = Some(self.paxos.start_proposal(block));
    }

    /// Feed one consensus payload through the open instance. Returns
    /// the blocks committed as a result, in chain order.
    pub async fn handle_extra(&mut self, extra: ExtraMessage) -> Vec<Block> {
        match extra {
            ExtraMessage::Tlc(tlc) => {
                if tlc.value.block_number < self.height {
                    return Vec::new();
                }
                self.tlc.record(tlc.value);
                self.drain_committable()
            }
            other => {
                self.paxos.on_extra(other).await;
                Vec::new()
            }
        }
    }

    /// Commit every height that has a TLC majority, starting from the
    /// current one.
    fn drain_committable(&mut self) -> Vec<Block> {
        let mut committed = Vec::new();
        while self.tlc.has_majority(self.height) {
            let Some(block) = self.tlc.take(self.height) else {
                break;
            };
            self.commit(block.clone());
            committed.push(block);
        }
        committed
    }

    fn commit(&mut self, block: Block) {
        let hash = block.hash();
        info!(
            height = block.block_number,
            hash = %hash,
            kind = block.content.kind(),
            "block committed"
        );
        self.blocks.insert(hash.to_hex(), block);
        self.tail = hash;
        self.height += 1;

        // Close the instance: stop any proposer still retrying and open
        // a fresh instance for the new height.
        if let Some(task) = self.proposer.take() {
            task.abort();
        }
        self.paxos = Paxos::new(
            self.height,
            self.node_index,
            self.num_participants,
            self.retry_period,
            self.broadcaster.clone(),
        );
    }
}

impl<B: Broadcaster> Drop for Blockchain<B> {
    fn drop(&mut self) {
        if let Some(task) = self.proposer.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChannelBroadcaster;
    use swarmchain_core::extra::Tlc;

    fn naming(filename: &str) -> BlockContent {
        BlockContent::Naming {
            metahash: vec![0x42; 32],
            filename: filename.into(),
        }
    }

    fn chain() -> Blockchain<ChannelBroadcaster> {
        let (broadcaster, _rx) = ChannelBroadcaster::new();
        Blockchain::new(0, 3, Duration::from_secs(60), broadcaster)
    }

    #[tokio::test]
    async fn test_tlc_majority_commits_block() {
        let mut chain = chain();
        let block = Block::genesis(naming("a.txt"));

        let committed = chain
            .handle_extra(ExtraMessage::Tlc(Tlc {
                value: block.clone(),
            }))
            .await;
        assert!(committed.is_empty());

        let committed = chain
            .handle_extra(ExtraMessage::Tlc(Tlc {
                value: block.clone(),
            }))
            .await;
        assert_eq!(committed, vec![block.clone()]);
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.tail_hex(), block.hash().to_hex());

        let (tail, blocks) = chain.get_blocks();
        assert_eq!(tail, block.hash().to_hex());
        assert_eq!(blocks.len(), 1);
    }

    #[tokio::test]
    async fn test_buffered_future_tlc_commits_in_order() {
        let mut chain = chain();
        let genesis = Block::genesis(naming("a.txt"));
        let child = Block::next(1, genesis.hash(), naming("b.txt"));

        // Confirmations for height 1 arrive first.
        for _ in 0..2 {
            let committed = chain
                .handle_extra(ExtraMessage::Tlc(Tlc {
                    value: child.clone(),
                }))
                .await;
            assert!(committed.is_empty());
        }

        chain
            .handle_extra(ExtraMessage::Tlc(Tlc {
                value: genesis.clone(),
            }))
            .await;
        let committed = chain
            .handle_extra(ExtraMessage::Tlc(Tlc {
                value: genesis.clone(),
            }))
            .await;
        assert_eq!(committed, vec![genesis.clone(), child.clone()]);
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.tail_hex(), child.hash().to_hex());
    }

    #[tokio::test]
    async fn test_stale_tlc_ignored_after_commit() {
        let mut chain = chain();
        let block = Block::genesis(naming("a.txt"));
        for _ in 0..2 {
            chain
                .handle_extra(ExtraMessage::Tlc(Tlc {
                    value: block.clone(),
                }))
                .await;
        }
        assert_eq!(chain.height(), 1);

        let committed = chain
            .handle_extra(ExtraMessage::Tlc(Tlc {
                value: block.clone(),
            }))
            .await;
        assert!(committed.is_empty());
        assert_eq!(chain.height(), 1);
    }

    #[tokio::test]
    async fn test_proposal_in_flight_blocks_second() {
        let mut chain = chain();
        chain.propose_content(naming("a.txt"));
        assert!(chain.proposing());
        chain.propose_content(naming("b.txt"));
        assert!(chain.proposing());
    }
}
