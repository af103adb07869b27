//! Swarmchain Paxos - Single-decree Paxos instances, threshold logical
//! clocks and the hash-linked block chain they decide.
//!
//! One [`Paxos`] instance decides the block at one height. [`Blockchain`]
//! chains the instances: each TLC majority commits the decided block and
//! opens the instance for the next height. Messages travel as consensus
//! payloads over the gossip layer, through the [`Broadcaster`] seam.

pub mod broadcast;
pub mod chain;
pub mod paxos;
pub mod round;
pub mod tlc;

pub use broadcast::Broadcaster;
pub use chain::Blockchain;
pub use paxos::Paxos;
pub use round::RoundIdGenerator;
pub use tlc::TlcTracker;
