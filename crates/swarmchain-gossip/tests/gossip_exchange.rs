//! End-to-end gossip tests over real UDP sockets on loopback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use swarmchain_core::extra::Tlc;
use swarmchain_core::{Block, BlockContent, ExtraMessage};
use swarmchain_gossip::{GossipHandle, Gossiper, GossiperConfig};

async fn start(name: &str) -> (Arc<Gossiper>, GossipHandle) {
    let config = GossiperConfig {
        bind_addr: "127.0.0.1:0".into(),
        identifier: name.into(),
        anti_entropy_secs: 1,
        route_timer_secs: 0,
    };
    let gossiper = Arc::new(Gossiper::new(config).await.unwrap());
    let handle = gossiper.handle();
    let (ready_tx, ready_rx) = oneshot::channel();
    let runner = Arc::clone(&gossiper);
    tokio::spawn(async move { runner.run(ready_tx).await });
    ready_rx.await.unwrap();
    (gossiper, handle)
}

type Seen = Arc<Mutex<Vec<(String, String)>>>;

async fn record_messages(gossiper: &Gossiper) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    gossiper
        .register_callback(Box::new(move |origin, packet| {
            let text = packet
                .rumor
                .as_ref()
                .map(|r| r.text.clone())
                .or_else(|| packet.private.as_ref().map(|p| p.text.clone()))
                .unwrap_or_default();
            sink.lock().unwrap().push((origin.to_string(), text));
        }))
        .await;
    seen
}

async fn wait_for(seen: &Seen, origin: &str, text: &str) -> bool {
    for _ in 0..100 {
        if seen
            .lock()
            .unwrap()
            .iter()
            .any(|(o, t)| o == origin && t == text)
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn test_rumor_reaches_direct_peer() {
    let (_ga, a) = start("alice").await;
    let (gb, b) = start("bob").await;
    let seen = record_messages(&gb).await;

    a.add_addresses(&[b.get_local_addr()]).await.unwrap();
    a.add_message("hello").await;

    assert!(wait_for(&seen, "alice", "hello").await);
}

#[tokio::test]
async fn test_rumor_spreads_transitively() {
    // alice only knows bob, bob only knows carol. Mongering plus
    // anti-entropy must still carry the rumor to carol.
    let (_ga, a) = start("alice").await;
    let (_gb, b) = start("bob").await;
    let (gc, c) = start("carol").await;
    let seen = record_messages(&gc).await;

    a.add_addresses(&[b.get_local_addr()]).await.unwrap();
    b.add_addresses(&[c.get_local_addr()]).await.unwrap();
    a.add_message("spread me").await;

    assert!(wait_for(&seen, "alice", "spread me").await);
}

#[tokio::test]
async fn test_private_message_follows_learned_route() {
    let (ga, a) = start("alice").await;
    let (gb, b) = start("bob").await;
    let seen_a = record_messages(&ga).await;
    let seen_b = record_messages(&gb).await;

    a.add_addresses(&[b.get_local_addr()]).await.unwrap();

    // The rumor teaches bob a route back towards alice.
    a.add_message("route seed").await;
    assert!(wait_for(&seen_b, "alice", "route seed").await);

    b.add_private_message("psst", "alice", "bob", 10).await;
    assert!(wait_for(&seen_a, "bob", "psst").await);
}

#[tokio::test]
async fn test_extra_messages_delivered_in_order() {
    let (ga, a) = start("alice").await;
    let (gb, b) = start("bob").await;
    let mut extras = gb.extra_messages().unwrap();
    drop(ga.extra_messages());

    a.add_addresses(&[b.get_local_addr()]).await.unwrap();

    let block = Block::genesis(BlockContent::Naming {
        metahash: vec![1, 2, 3],
        filename: "a.txt".into(),
    });
    a.add_extra_message(ExtraMessage::Tlc(Tlc {
        value: block.clone(),
    }))
    .await;

    let received = tokio::time::timeout(Duration::from_secs(10), extras.recv())
        .await
        .expect("timed out waiting for consensus payload")
        .expect("channel closed");
    match received {
        ExtraMessage::Tlc(tlc) => assert_eq!(tlc.value, block),
        other => panic!("unexpected payload: {:?}", other),
    }
}
