use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use swarmchain_core::extra::{Accept, AcceptedValue, Prepare, Promise, Propose, Tlc};
use swarmchain_core::{Block, ExtraMessage};

use crate::broadcast::Broadcaster;
use crate::round::RoundIdGenerator;

/// Where this node stands in the current instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NoProposal,
    AwaitPromise,
    AwaitAccept,
    Consensus,
}

struct Inner {
    phase: Phase,
    // Acceptor side
    promised_round: Option<u64>,
    accepted: Option<AcceptedValue>,
    // Proposer side
    rounds: RoundIdGenerator,
    my_rounds: HashSet<u64>,
    current_round: Option<u64>,
    promise_count: u64,
    best_accepted: Option<AcceptedValue>,
    // Learner side
    accept_counts: HashMap<u64, u64>,
}

/// One single-decree Paxos instance, deciding the block at one height.
///
/// Every participant is acceptor and learner; any participant may also
/// propose. All messages are broadcast, so each node observes the full
/// exchange and can learn the decision independently.
pub struct Paxos<B: Broadcaster> {
    seq_id: u64,
    majority: u64,
    retry_period: Duration,
    broadcaster: B,
    inner: Arc<Mutex<Inner>>,
    promise_majority: Arc<Notify>,
    decided: watch::Sender<Option<Block>>,
}

impl<B: Broadcaster> Paxos<B> {
    pub fn new(
        seq_id: u64,
        node_index: u64,
        num_participants: u64,
        retry_period: Duration,
        broadcaster: B,
    ) -> Self {
        Paxos {
            seq_id,
            majority: num_participants / 2 + 1,
            retry_period,
            broadcaster,
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::NoProposal,
                promised_round: None,
                accepted: None,
                rounds: RoundIdGenerator::new(node_index, num_participants),
                my_rounds: HashSet::new(),
                current_round: None,
                promise_count: 0,
                best_accepted: None,
                accept_counts: HashMap::new(),
            })),
            promise_majority: Arc::new(Notify::new()),
            decided: watch::channel(None).0,
        }
    }

    /// Watch for the decided block. Fires at most once per instance.
    pub fn decided(&self) -> watch::Receiver<Option<Block>> {
        self.decided.subscribe()
    }

    /// Dispatch an incoming consensus payload to the matching role.
    /// TLC confirmations are handled a layer above.
    pub async fn on_extra(&self, extra: ExtraMessage) {
        match extra {
            ExtraMessage::Prepare(prepare) => self.on_prepare(prepare).await,
            ExtraMessage::Promise(promise) => self.on_promise(promise).await,
            ExtraMessage::Propose(propose) => self.on_propose(propose).await,
            ExtraMessage::Accept(accept) => self.on_accept(accept).await,
            ExtraMessage::Tlc(_) | ExtraMessage::SwarmInit(_) => {}
        }
    }

    /// Start proposing `value`. The returned task keeps retrying with
    /// fresh rounds until some value is decided for this height.
    pub fn start_proposal(&self, value: Block) -> JoinHandle<()> {
        let seq_id = self.seq_id;
        let majority = self.majority;
        let retry = self.retry_period;
        let broadcaster = self.broadcaster.clone();
        let inner = Arc::clone(&self.inner);
        let promise_majority = Arc::clone(&self.promise_majority);
        let mut decided_rx = self.decided.subscribe();

        tokio::spawn(async move {
            loop {
                if decided_rx.borrow().is_some() {
                    return;
                }

                let round = {
                    let mut inner = inner.lock().await;
                    let round = inner.rounds.next();
                    inner.my_rounds.insert(round);
                    inner.current_round = Some(round);
                    // Our own acceptor is part of the quorum: it counts
                    // as the first promise and contributes whatever it
                    // already accepted to the adoption rule.
                    inner.promise_count = 1;
                    inner.best_accepted = inner.accepted.clone();
                    inner.promised_round = Some(match inner.promised_round {
                        Some(promised) => promised.max(round),
                        None => round,
                    });
                    inner.phase = Phase::AwaitPromise;
                    if inner.promise_count >= majority {
                        // Single participant: the implicit promise is
                        // already a majority.
                        promise_majority.notify_one();
                    }
                    round
                };
                debug!(seq_id, round, majority, "opening paxos round");
                broadcaster
                    .broadcast(ExtraMessage::Prepare(Prepare {
                        seq_id,
                        round_id: round,
                    }))
                    .await;

                tokio::select! {
                    _ = promise_majority.notified() => {}
                    _ = decided_rx.changed() => return,
                    _ = tokio::time::sleep(retry) => continue,
                }

                // A promise majority: propose the highest value already
                // accepted somewhere, or our own if the slate is clean.
                let proposal = {
                    let mut inner = inner.lock().await;
                    if inner.current_round != Some(round) {
                        continue;
                    }
                    // A stale wakeup permit from an earlier round can
                    // slip through the select; only a real majority for
                    // this round moves to phase two.
                    if inner.promise_count < majority {
                        continue;
                    }
                    inner.phase = Phase::AwaitAccept;
                    let adopted = inner
                        .best_accepted
                        .as_ref()
                        .map(|a| a.value.clone())
                        .unwrap_or_else(|| value.clone());
                    Propose {
                        seq_id,
                        round_id: round,
                        value: adopted,
                    }
                };
                broadcaster.broadcast(ExtraMessage::Propose(proposal)).await;

                tokio::select! {
                    _ = decided_rx.changed() => return,
                    _ = tokio::time::sleep(retry) => continue,
                }
            }
        })
    }

    /// Acceptor: promise the round if it is the highest seen, reporting
    /// anything already accepted. Our own rounds are never answered over
    /// the wire; the proposer counts itself when the round opens.
    async fn on_prepare(&self, prepare: Prepare) {
        if prepare.seq_id != self.seq_id {
            return;
        }
        let reply = {
            let mut inner = self.inner.lock().await;
            if inner.my_rounds.contains(&prepare.round_id) {
                None
            } else if inner
                .promised_round
                .is_some_and(|promised| prepare.round_id <= promised)
            {
                // An outdated round is refused, but anything already
                // accepted is still reported back.
                inner.accepted.clone().map(|accepted| Promise {
                    seq_id: self.seq_id,
                    round_id: prepare.round_id,
                    accepted: Some(accepted),
                })
            } else {
                inner.promised_round = Some(prepare.round_id);
                Some(Promise {
                    seq_id: self.seq_id,
                    round_id: prepare.round_id,
                    accepted: inner.accepted.clone(),
                })
            }
        };
        if let Some(promise) = reply {
            self.broadcaster
                .broadcast(ExtraMessage::Promise(promise))
                .await;
        }
    }

    /// Proposer: count promises for the round in flight and remember the
    /// highest reported accepted value.
    async fn on_promise(&self, promise: Promise) {
        if promise.seq_id != self.seq_id {
            return;
        }
        let reached = {
            let mut inner = self.inner.lock().await;
            if inner.phase != Phase::AwaitPromise
                || inner.current_round != Some(promise.round_id)
            {
                return;
            }
            if let Some(reported) = promise.accepted {
                let higher = inner
                    .best_accepted
                    .as_ref()
                    .is_none_or(|best| reported.round_id > best.round_id);
                if higher {
                    inner.best_accepted = Some(reported);
                }
            }
            inner.promise_count += 1;
            inner.promise_count >= self.majority
        };
        if reached {
            self.promise_majority.notify_one();
        }
    }

    /// Acceptor: accept the proposal unless a higher round was promised
    /// in the meantime.
    async fn on_propose(&self, propose: Propose) {
        if propose.seq_id != self.seq_id {
            return;
        }
        let reply = {
            let mut inner = self.inner.lock().await;
            if inner
                .promised_round
                .is_some_and(|promised| propose.round_id < promised)
            {
                None
            } else {
                inner.accepted = Some(AcceptedValue {
                    round_id: propose.round_id,
                    value: propose.value.clone(),
                });
                Some(Accept {
                    seq_id: self.seq_id,
                    round_id: propose.round_id,
                    value: propose.value,
                })
            }
        };
        if let Some(accept) = reply {
            self.broadcaster.broadcast(ExtraMessage::Accept(accept)).await;
        }
    }

    /// Learner: once a majority accepts the same round, the value is
    /// decided. Exactly one TLC confirmation is emitted per instance.
    async fn on_accept(&self, accept: Accept) {
        if accept.seq_id != self.seq_id {
            return;
        }
        let decided = {
            let mut inner = self.inner.lock().await;
            let count = inner.accept_counts.entry(accept.round_id).or_insert(0);
            *count += 1;
            if *count >= self.majority && inner.phase != Phase::Consensus {
                inner.phase = Phase::Consensus;
                Some(accept.value)
            } else {
                None
            }
        };
        if let Some(value) = decided {
            debug!(seq_id = self.seq_id, round = accept.round_id, "value decided");
            self.decided.send_replace(Some(value.clone()));
            self.broadcaster
                .broadcast(ExtraMessage::Tlc(Tlc { value }))
                .await;
        }
    }
}
