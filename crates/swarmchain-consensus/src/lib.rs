//! Swarmchain Consensus - Application facades over the block chain.
//!
//! The [`ConsensusRunner`] is the single task that owns a node's chain.
//! It consumes the consensus payloads delivered by gossip, settles the
//! pending propositions of the naming and swarm facades on each commit,
//! and keeps exactly one proposition in flight.

pub mod error;
pub mod mapper;
pub mod names;
pub mod runner;

pub use error::ConsensusError;
pub use mapper::{LinearPathGenerator, NearestTargetMapper, PathGenerator, TargetsMapper};
pub use names::NameIndex;
pub use runner::{ConsensusHandle, ConsensusRunner};
