//! Full cluster tests: several nodes on loopback UDP reaching
//! consensus through gossip.

use std::time::Duration;

use swarmchain_consensus::ConsensusError;
use swarmchain_core::Vec3;
use swarmchain_node::{Node, NodeConfig, RunningNode};

/// Start `n` nodes on ephemeral ports and connect them all-to-all.
async fn start_cluster(n: u64) -> Vec<RunningNode> {
    let mut running = Vec::new();
    for index in 0..n {
        let config = NodeConfig {
            identifier: format!("node-{}", index),
            gossip_addr: "127.0.0.1:0".parse().unwrap(),
            peers: Vec::new(),
            anti_entropy_secs: 1,
            route_timer_secs: 0,
            num_participants: n,
            node_index: index,
            paxos_retry_secs: 1,
        };
        let node = Node::new(config).unwrap();
        running.push(node.start().await.unwrap());
    }

    let addrs: Vec<String> = running.iter().map(|r| r.gossip.get_local_addr()).collect();
    for (index, node) in running.iter().enumerate() {
        let peers: Vec<String> = addrs
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .map(|(_, addr)| addr.clone())
            .collect();
        node.gossip.add_addresses(&peers).await.unwrap();
    }
    running
}

/// Wait until every node's chain holds `len` blocks.
async fn wait_chain_length(cluster: &[RunningNode], len: usize) {
    for _ in 0..120 {
        let mut done = true;
        for node in cluster {
            let (_, blocks) = node.consensus.get_blocks().await.unwrap();
            if blocks.len() < len {
                done = false;
                break;
            }
        }
        if done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("cluster never reached chain length {}", len);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_naming_reaches_consensus_across_cluster() {
    let cluster = start_cluster(3).await;

    let metahash = vec![0xab; 32];
    let name = cluster[0]
        .consensus
        .propose_name(metahash.clone(), "report.pdf".into())
        .await
        .unwrap();
    assert_eq!(name, "report.pdf");

    wait_chain_length(&cluster, 1).await;

    // Every node resolves the name and agrees on the tail.
    let (tail0, _) = cluster[0].consensus.get_blocks().await.unwrap();
    for node in &cluster {
        let resolved = node
            .consensus
            .resolve_filename("report.pdf".into())
            .await
            .unwrap();
        assert_eq!(resolved, Some(metahash.clone()));
        let (tail, blocks) = node.consensus.get_blocks().await.unwrap();
        assert_eq!(tail, tail0);
        assert_eq!(blocks.len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_five_nodes_agree_and_chain_walks_to_genesis() {
    let cluster = start_cluster(5).await;

    cluster[0]
        .consensus
        .propose_name(vec![0x11; 32], "test1.txt".into())
        .await
        .unwrap();
    cluster[1]
        .consensus
        .propose_name(vec![0x22; 32], "test2.txt".into())
        .await
        .unwrap();
    wait_chain_length(&cluster, 2).await;

    // Walk each node's chain from the tail back to the zero hash.
    for node in &cluster {
        let (tail, blocks) = node.consensus.get_blocks().await.unwrap();
        let mut cursor = tail;
        let mut walked = 0;
        while let Some(block) = blocks.get(&cursor) {
            assert_eq!(block.hash().to_hex(), cursor);
            cursor = block.previous_hash.to_hex();
            walked += 1;
        }
        assert_eq!(walked, 2);
        assert_eq!(cursor, swarmchain_core::Hash::ZERO.to_hex());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_filename_rejected_cluster_wide() {
    let cluster = start_cluster(3).await;

    cluster[0]
        .consensus
        .propose_name(vec![0x01; 32], "shared.txt".into())
        .await
        .unwrap();
    wait_chain_length(&cluster, 1).await;

    // A different node tries to reuse the filename.
    let result = cluster[1]
        .consensus
        .propose_name(vec![0x02; 32], "shared.txt".into())
        .await;
    assert_eq!(
        result,
        Err(ConsensusError::DuplicateKey("shared.txt".into()))
    );

    // Same metahash under a new name resolves to the original.
    let existing = cluster[2]
        .consensus
        .propose_name(vec![0x01; 32], "renamed.txt".into())
        .await
        .unwrap();
    assert_eq!(existing, "shared.txt");

    wait_chain_length(&cluster, 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_swarm_pattern_commits_mapping_and_paths() {
    let cluster = start_cluster(3).await;

    cluster[0]
        .consensus
        .announce_swarm(
            "triangle".into(),
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
            ],
            vec![
                Vec3::new(0.0, 5.0, 0.0),
                Vec3::new(1.0, 5.0, 0.0),
                Vec3::new(2.0, 5.0, 0.0),
            ],
        )
        .await
        .unwrap();

    // One mapping block, then one path block.
    wait_chain_length(&cluster, 2).await;

    let (_, blocks) = cluster[0].consensus.get_blocks().await.unwrap();
    let kinds: Vec<&str> = {
        let mut ordered: Vec<_> = blocks.values().collect();
        ordered.sort_by_key(|b| b.block_number);
        ordered.iter().map(|b| b.content.kind()).collect()
    };
    assert_eq!(kinds, vec!["mapping", "path"]);
}
