use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use swarmchain_consensus::{
    ConsensusHandle, ConsensusRunner, LinearPathGenerator, NearestTargetMapper,
};
use swarmchain_gossip::{GossipHandle, Gossiper, GossiperConfig};

use crate::config::NodeConfig;

/// A configured but not yet started node.
pub struct Node {
    config: NodeConfig,
}

/// A started node: the gossip engine, the consensus runner and the
/// handles to talk to them.
pub struct RunningNode {
    pub gossip: GossipHandle,
    pub consensus: ConsensusHandle,
    gossiper: Arc<Gossiper>,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self> {
        if config.num_participants == 0 {
            return Err(anyhow!("num_participants must be at least 1"));
        }
        if config.node_index >= config.num_participants {
            return Err(anyhow!(
                "node_index {} out of range for {} participants",
                config.node_index,
                config.num_participants
            ));
        }
        Ok(Node { config })
    }

    /// Bind the socket, spawn the gossip and consensus tasks and
    /// return once the node is processing packets.
    pub async fn start(&self) -> Result<RunningNode> {
        let gossiper = Arc::new(
            Gossiper::new(GossiperConfig {
                bind_addr: self.config.gossip_addr.to_string(),
                identifier: self.config.identifier.clone(),
                anti_entropy_secs: self.config.anti_entropy_secs,
                route_timer_secs: self.config.route_timer_secs,
            })
            .await?,
        );
        let gossip = gossiper.handle();
        gossip.add_addresses(&self.config.peers).await?;

        let extras = gossiper
            .extra_messages()
            .ok_or_else(|| anyhow!("consensus payload stream already taken"))?;
        let (consensus, consensus_task) = ConsensusRunner::spawn(
            self.config.node_index,
            self.config.num_participants,
            Duration::from_secs(self.config.paxos_retry_secs.max(1)),
            gossip.clone(),
            Box::new(NearestTargetMapper),
            Box::new(LinearPathGenerator),
            extras,
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let runner = Arc::clone(&gossiper);
        let gossip_task = tokio::spawn(async move { runner.run(ready_tx).await });
        ready_rx
            .await
            .map_err(|_| anyhow!("gossiper failed to start"))?;

        info!(
            identifier = %self.config.identifier,
            addr = %gossip.get_local_addr(),
            participant = self.config.node_index,
            "node started"
        );

        Ok(RunningNode {
            gossip,
            consensus,
            gossiper,
            tasks: vec![gossip_task, consensus_task],
        })
    }

    /// Run the node until interrupted.
    pub async fn run(&self) -> Result<()> {
        let running = self.start().await?;
        tokio::signal::ctrl_c().await?;
        info!("shutting down");
        running.shutdown().await;
        Ok(())
    }
}

impl RunningNode {
    pub async fn shutdown(self) {
        self.gossiper.stop().await;
        for task in self.tasks {
            task.abort();
        }
    }
}
