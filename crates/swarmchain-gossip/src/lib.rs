//! Swarmchain Gossip - Rumor mongering and anti-entropy
//!
//! This crate provides the gossip protocol engine: UDP transport, the
//! serialized packet handler, per-origin rumor tracking, hop-by-hop
//! routing and the status-exchange anti-entropy protocol.

pub mod error;
pub mod gossiper;
mod handler;
pub mod routes;
pub mod tracking;
pub mod transport;

pub use error::GossipError;
pub use gossiper::{Gossiper, GossiperConfig, GossipHandle, NewMessageCallback};
pub use routes::{RouteEntry, RouteTable};
pub use tracking::RumorStore;
pub use transport::{RawPacket, UdpTransport};
