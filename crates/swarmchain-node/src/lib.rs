//! Swarmchain node: configuration, wiring and lifecycle.

pub mod cli;
pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::{Node, RunningNode};
