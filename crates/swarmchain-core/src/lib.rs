//! Swarmchain Core - Wire and chain types
//!
//! This crate provides the gossip packet types, the Paxos/TLC extra
//! message payloads, block and content types, and hashing.

pub mod block;
pub mod crypto;
pub mod error;
pub mod extra;
pub mod packet;
pub mod serialize;

pub use block::{Block, BlockContent, Vec3};
pub use crypto::{hash_sha256, Hash};
pub use error::CoreError;
pub use extra::{Accept, AcceptedValue, ExtraMessage, Prepare, Promise, Propose, SwarmInit, Tlc};
pub use packet::{GossipMessage, GossipPacket, PeerStatus, PrivateMessage, RumorMessage, StatusPacket};
