use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name this node gossips under
    pub identifier: String,

    /// UDP bind address for the gossip socket
    pub gossip_addr: SocketAddr,

    /// Addresses of initially known peers
    pub peers: Vec<String>,

    /// Anti-entropy period in seconds (0 uses the protocol default)
    pub anti_entropy_secs: u64,

    /// Route-rumor period in seconds, 0 disables route rumors
    pub route_timer_secs: u64,

    /// Number of consensus participants
    pub num_participants: u64,

    /// Index of this node among the participants, 0-based
    pub node_index: u64,

    /// Paxos proposer retry period in seconds
    pub paxos_retry_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            identifier: "node-0".into(),
            gossip_addr: "127.0.0.1:5000".parse().unwrap(),
            peers: Vec::new(),
            anti_entropy_secs: 10,
            route_timer_secs: 0,
            num_participants: 3,
            node_index: 0,
            paxos_retry_secs: 3,
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Generate a sample configuration for a three node local cluster
pub fn generate_sample_config() -> NodeConfig {
    NodeConfig {
        identifier: "node-0".into(),
        gossip_addr: "127.0.0.1:5000".parse().unwrap(),
        peers: vec!["127.0.0.1:5001".into(), "127.0.0.1:5002".into()],
        anti_entropy_secs: 10,
        route_timer_secs: 60,
        num_participants: 3,
        node_index: 0,
        paxos_retry_secs: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.num_participants, 3);
        assert_eq!(config.node_index, 0);
    }

    #[test]
    fn test_sample_config() {
        let config = generate_sample_config();
        assert_eq!(config.peers.len(), 2);
        assert!(config.paxos_retry_secs > 0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir().join("swarmchain-config-test.json");
        let config = generate_sample_config();
        config.save(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.identifier, config.identifier);
        assert_eq!(loaded.peers, config.peers);
        let _ = std::fs::remove_file(&path);
    }
}
