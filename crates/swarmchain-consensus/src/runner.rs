use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use swarmchain_core::extra::SwarmInit;
use swarmchain_core::{Block, BlockContent, ExtraMessage, Vec3};
use swarmchain_paxos::{Blockchain, Broadcaster};

use crate::error::ConsensusError;
use crate::mapper::{PathGenerator, TargetsMapper};
use crate::names::NameIndex;

/// Capacity of the facade command queue.
const COMMAND_QUEUE_CAPACITY: usize = 64;

enum Command {
    ProposeNaming {
        metahash: Vec<u8>,
        filename: String,
        reply: oneshot::Sender<Result<String, ConsensusError>>,
    },
    ProposeTargets {
        pattern_id: String,
        targets: Vec<Vec3>,
        reply: oneshot::Sender<Result<(), ConsensusError>>,
    },
    ProposePaths {
        pattern_id: String,
        paths: Vec<Vec<Vec3>>,
        reply: oneshot::Sender<Result<(), ConsensusError>>,
    },
    AnnounceSwarm {
        init: SwarmInit,
    },
    GetBlocks {
        reply: oneshot::Sender<(String, HashMap<String, Block>)>,
    },
    ResolveFilename {
        filename: String,
        reply: oneshot::Sender<Option<Vec<u8>>>,
    },
}

enum PendingReply {
    Naming(oneshot::Sender<Result<String, ConsensusError>>),
    Unit(oneshot::Sender<Result<(), ConsensusError>>),
    None,
}

/// A proposition waiting for its spot in the chain. At most one is in
/// flight; the rest are resubmitted as instances close.
struct Pending {
    content: BlockContent,
    reply: PendingReply,
}

/// Cloneable facade over a running [`ConsensusRunner`].
#[derive(Clone)]
pub struct ConsensusHandle {
    tx: mpsc::Sender<Command>,
}

impl ConsensusHandle {
    /// Claim `filename` for `metahash`. Resolves once the record is in
    /// the chain. A filename already claimed is an error; a metahash
    /// already named returns its existing filename.
    pub async fn propose_name(
        &self,
        metahash: Vec<u8>,
        filename: String,
    ) -> Result<String, ConsensusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ProposeNaming {
                metahash,
                filename,
                reply,
            })
            .await
            .map_err(|_| ConsensusError::Stopped)?;
        rx.await.map_err(|_| ConsensusError::Stopped)?
    }

    /// Propose the target assignment for a pattern. Resolves once some
    /// assignment for the pattern is committed.
    pub async fn propose_targets(
        &self,
        pattern_id: String,
        targets: Vec<Vec3>,
    ) -> Result<(), ConsensusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ProposeTargets {
                pattern_id,
                targets,
                reply,
            })
            .await
            .map_err(|_| ConsensusError::Stopped)?;
        rx.await.map_err(|_| ConsensusError::Stopped)?
    }

    /// Propose the flight paths for a pattern. Resolves once some path
    /// set for the pattern is committed.
    pub async fn propose_paths(
        &self,
        pattern_id: String,
        paths: Vec<Vec<Vec3>>,
    ) -> Result<(), ConsensusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ProposePaths {
                pattern_id,
                paths,
                reply,
            })
            .await
            .map_err(|_| ConsensusError::Stopped)?;
        rx.await.map_err(|_| ConsensusError::Stopped)?
    }

    /// Announce a new swarm pattern to all participants. Every node,
    /// this one included, reacts by computing and proposing the target
    /// assignment; the chain picks one.
    pub async fn announce_swarm(
        &self,
        pattern_id: String,
        initial_pos: Vec<Vec3>,
        target_pos: Vec<Vec3>,
    ) -> Result<(), ConsensusError> {
        self.tx
            .send(Command::AnnounceSwarm {
                init: SwarmInit {
                    pattern_id,
                    initial_pos,
                    target_pos,
                },
            })
            .await
            .map_err(|_| ConsensusError::Stopped)
    }

    /// Snapshot of the chain: hex tail hash plus all blocks by hash.
    pub async fn get_blocks(
        &self,
    ) -> Result<(String, HashMap<String, Block>), ConsensusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::GetBlocks { reply })
            .await
            .map_err(|_| ConsensusError::Stopped)?;
        rx.await.map_err(|_| ConsensusError::Stopped)
    }

    /// Look up the metahash a filename resolves to, if committed.
    pub async fn resolve_filename(
        &self,
        filename: String,
    ) -> Result<Option<Vec<u8>>, ConsensusError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ResolveFilename { filename, reply })
            .await
            .map_err(|_| ConsensusError::Stopped)?;
        rx.await.map_err(|_| ConsensusError::Stopped)
    }
}

/// The single task owning a node's chain and facade state.
pub struct ConsensusRunner<B: Broadcaster> {
    chain: Blockchain<B>,
    broadcaster: B,
    mapper: Box<dyn TargetsMapper>,
    paths: Box<dyn PathGenerator>,
    names: NameIndex,
    pending: VecDeque<Pending>,
    swarms: HashMap<String, SwarmInit>,
    committed_mappings: HashSet<String>,
    committed_paths: HashSet<String>,
}

impl<B: Broadcaster> ConsensusRunner<B> {
    /// Spawn the runner task. `extras` is the in-order stream of
    /// consensus payloads delivered by the gossip layer.
    pub fn spawn(
        node_index: u64,
        num_participants: u64,
        retry_period: Duration,
        broadcaster: B,
        mapper: Box<dyn TargetsMapper>,
        paths: Box<dyn PathGenerator>,
        extras: mpsc::UnboundedReceiver<ExtraMessage>,
    ) -> (ConsensusHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let runner = ConsensusRunner {
            chain: Blockchain::new(node_index, num_participants, retry_period, broadcaster.clone()),
            broadcaster,
            mapper,
            paths,
            names: NameIndex::new(),
            pending: VecDeque::new(),
            swarms: HashMap::new(),
            committed_mappings: HashSet::new(),
            committed_paths: HashSet::new(),
        };
        let task = tokio::spawn(runner.run(commands, extras));
        (ConsensusHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut extras: mpsc::UnboundedReceiver<ExtraMessage>,
    ) {
        loop {
            tokio::select! {
                extra = extras.recv() => match extra {
                    Some(extra) => self.on_extra(extra).await,
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
            }
        }
        debug!("consensus runner stopped");
    }

    async fn on_extra(&mut self, extra: ExtraMessage) {
        if let ExtraMessage::SwarmInit(init) = &extra {
            self.on_swarm_init(init.clone());
        }
        let committed = self.chain.handle_extra(extra).await;
        for block in committed {
            self.on_commit(block);
        }
        self.maybe_propose();
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::ProposeNaming {
                metahash,
                filename,
                reply,
            } => {
                if self.names.contains_filename(&filename) {
                    let _ = reply.send(Err(ConsensusError::DuplicateKey(filename)));
                    return;
                }
                if let Some(existing) = self.names.filename_of(&metahash) {
                    let _ = reply.send(Ok(existing.to_string()));
                    return;
                }
                self.pending.push_back(Pending {
                    content: BlockContent::Naming { metahash, filename },
                    reply: PendingReply::Naming(reply),
                });
                self.maybe_propose();
            }
            Command::ProposeTargets {
                pattern_id,
                targets,
                reply,
            } => {
                if self.committed_mappings.contains(&pattern_id) {
                    let _ = reply.send(Ok(()));
                    return;
                }
                self.pending.push_back(Pending {
                    content: BlockContent::Mapping {
                        pattern_id,
                        targets,
                    },
                    reply: PendingReply::Unit(reply),
                });
                self.maybe_propose();
            }
            Command::ProposePaths {
                pattern_id,
                paths,
                reply,
            } => {
                if self.committed_paths.contains(&pattern_id) {
                    let _ = reply.send(Ok(()));
                    return;
                }
                self.pending.push_back(Pending {
                    content: BlockContent::Path { pattern_id, paths },
                    reply: PendingReply::Unit(reply),
                });
                self.maybe_propose();
            }
            Command::AnnounceSwarm { init } => {
                info!(pattern = %init.pattern_id, "announcing swarm pattern");
                // Our own copy comes back through the gossip loopback,
                // so every participant reacts the same way.
                self.broadcaster
                    .broadcast(ExtraMessage::SwarmInit(init))
                    .await;
            }
            Command::GetBlocks { reply } => {
                let _ = reply.send(self.chain.get_blocks());
            }
            Command::ResolveFilename { filename, reply } => {
                let _ = reply.send(self.names.metahash_of(&filename).map(|m| m.to_vec()));
            }
        }
    }

    /// A new pattern was announced: compute our target assignment and
    /// queue it as a proposition. The chain decides whose wins.
    fn on_swarm_init(&mut self, init: SwarmInit) {
        if init.initial_pos.len() != init.target_pos.len() {
            warn!(
                pattern = %init.pattern_id,
                "swarm init with mismatched position counts, ignoring"
            );
            return;
        }
        if self.swarms.contains_key(&init.pattern_id)
            || self.committed_mappings.contains(&init.pattern_id)
        {
            return;
        }
        let assigned = self.mapper.map(&init.initial_pos, &init.target_pos);
        self.pending.push_back(Pending {
            content: BlockContent::Mapping {
                pattern_id: init.pattern_id.clone(),
                targets: assigned,
            },
            reply: PendingReply::None,
        });
        self.swarms.insert(init.pattern_id.clone(), init);
        self.maybe_propose();
    }

    /// Settle pending propositions against a freshly committed block
    /// and update the facade indexes.
    fn on_commit(&mut self, block: Block) {
        match &block.content {
            BlockContent::Naming { metahash, filename } => {
                self.names.insert(filename, metahash);
                let committed_metahash = metahash.clone();
                let committed_filename = filename.clone();
                self.settle(|content| match content {
                    BlockContent::Naming { metahash, filename } => {
                        if *metahash == committed_metahash && *filename == committed_filename {
                            Settlement::Won(committed_filename.clone())
                        } else if *filename == committed_filename {
                            Settlement::Lost(ConsensusError::DuplicateKey(filename.clone()))
                        } else if *metahash == committed_metahash {
                            // The content is already named; resolve to
                            // the name that won.
                            Settlement::Won(committed_filename.clone())
                        } else {
                            Settlement::Keep
                        }
                    }
                    _ => Settlement::Keep,
                });
            }
            BlockContent::Mapping {
                pattern_id,
                targets,
            } => {
                self.committed_mappings.insert(pattern_id.clone());
                let committed_pattern = pattern_id.clone();
                self.settle(|content| match content {
                    BlockContent::Mapping { pattern_id, .. }
                        if *pattern_id == committed_pattern =>
                    {
                        Settlement::Won(String::new())
                    }
                    _ => Settlement::Keep,
                });
                // The assignment is fixed; move the pattern to the path
                // phase.
                if let Some(init) = self.swarms.get(pattern_id) {
                    let paths = self.paths.generate(&init.initial_pos, targets);
                    self.pending.push_back(Pending {
                        content: BlockContent::Path {
                            pattern_id: pattern_id.clone(),
                            paths,
                        },
                        reply: PendingReply::None,
                    });
                }
            }
            BlockContent::Path { pattern_id, .. } => {
                self.committed_paths.insert(pattern_id.clone());
                let committed_pattern = pattern_id.clone();
                self.settle(|content| match content {
                    BlockContent::Path { pattern_id, .. }
                        if *pattern_id == committed_pattern =>
                    {
                        Settlement::Won(String::new())
                    }
                    _ => Settlement::Keep,
                });
                self.swarms.remove(pattern_id);
            }
        }
    }

    /// Walk the pending queue, resolving every proposition the given
    /// rule settles.
    fn settle<F>(&mut self, rule: F)
    where
        F: Fn(&BlockContent) -> Settlement,
    {
        let mut remaining = VecDeque::with_capacity(self.pending.len());
        for pending in self.pending.drain(..) {
            match rule(&pending.content) {
                Settlement::Keep => remaining.push_back(pending),
                Settlement::Won(filename) => match pending.reply {
                    PendingReply::Naming(reply) => {
                        let _ = reply.send(Ok(filename));
                    }
                    PendingReply::Unit(reply) => {
                        let _ = reply.send(Ok(()));
                    }
                    PendingReply::None => {}
                },
                Settlement::Lost(error) => match pending.reply {
                    PendingReply::Naming(reply) => {
                        let _ = reply.send(Err(error));
                    }
                    PendingReply::Unit(reply) => {
                        let _ = reply.send(Err(error));
                    }
                    PendingReply::None => {}
                },
            }
        }
        self.pending = remaining;
    }

    /// Put the head of the queue in flight if the open instance is
    /// free.
    fn maybe_propose(&mut self) {
        if self.chain.proposing() {
            return;
        }
        if let Some(front) = self.pending.front() {
            self.chain.propose_content(front.content.clone());
        }
    }
}

enum Settlement {
    Keep,
    Won(String),
    Lost(ConsensusError),
}
