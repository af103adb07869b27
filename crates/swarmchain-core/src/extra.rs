use serde::{Deserialize, Serialize};

use crate::block::{Block, Vec3};

/// PREPARE request from a proposer to the acceptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prepare {
    /// Block height this Paxos instance decides.
    pub seq_id: u64,
    /// Proposer round ID, globally unique by construction.
    pub round_id: u64,
}

/// A previously accepted (round, value) pair reported in a promise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedValue {
    pub round_id: u64,
    pub value: Block,
}

/// PROMISE from an acceptor to a proposer. `round_id` is the round being
/// promised; `accepted` carries the highest previously accepted value,
/// if any, so competing proposers converge on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promise {
    pub seq_id: u64,
    pub round_id: u64,
    pub accepted: Option<AcceptedValue>,
}

/// PROPOSE from a proposer to the acceptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propose {
    pub seq_id: u64,
    pub round_id: u64,
    pub value: Block,
}

/// ACCEPT broadcast by an acceptor to the proposer and all learners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accept {
    pub seq_id: u64,
    pub round_id: u64,
    pub value: Block,
}

/// Sent by a node once it knows consensus has been reached for a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tlc {
    pub value: Block,
}

/// Initiates the mapping phase for the swarm. Carries the initial drone
/// positions and the target positions; the two lists have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmInit {
    pub pattern_id: String,
    pub initial_pos: Vec<Vec3>,
    pub target_pos: Vec<Vec3>,
}

/// Consensus payload carried by a rumor message: exactly one of the
/// Paxos phases, a TLC confirmation, or a swarm initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtraMessage {
    Prepare(Prepare),
    Promise(Promise),
    Propose(Propose),
    Accept(Accept),
    Tlc(Tlc),
    SwarmInit(SwarmInit),
}
