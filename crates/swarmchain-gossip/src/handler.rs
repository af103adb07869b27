use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use swarmchain_core::{serialize, GossipMessage, GossipPacket, PrivateMessage, RumorMessage, StatusPacket};

use crate::gossiper::Shared;
use crate::transport::RawPacket;

/// How long to wait for a status ack before re-propagating a rumor to
/// another peer.
const REINVOKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probability of continuing to monger a rumor once a peer reports
/// being fully synchronized.
const COIN_FLIP_P: f64 = 0.5;

/// Events consumed by the serialized handler task.
pub(crate) enum HandlerEvent {
    /// A decoded packet, either from the network or dispatched locally
    /// (in which case `addr` is the node's own address).
    Packet {
        packet: GossipPacket,
        addr: SocketAddr,
    },
    /// A reinvoke timer fired for a pending rumor.
    Reinvoke { from: SocketAddr, seq: u64 },
    Shutdown,
}

/// A rumor awaiting a status ack from the peer it was sent to.
struct PendingRumor {
    seq: u64,
    rumor: RumorMessage,
    except: Vec<SocketAddr>,
    timer: JoinHandle<()>,
}

/// The protocol state machine. All packets and timer firings are
/// funneled through one task, so no per-field locking is needed for
/// the rumor bookkeeping.
pub(crate) struct Handler {
    shared: Arc<Shared>,
    /// Pending rumors keyed by the address each rumor was received
    /// from. A status packet from that address settles all of them.
    pending: HashMap<SocketAddr, Vec<PendingRumor>>,
    next_seq: u64,
}

impl Handler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Handler {
            shared,
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut raw_rx: mpsc::Receiver<RawPacket>,
        mut events_rx: mpsc::Receiver<HandlerEvent>,
    ) {
        loop {
            tokio::select! {
                raw = raw_rx.recv() => match raw {
                    Some(raw) => self.handle_raw(raw).await,
                    None => break,
                },
                event = events_rx.recv() => match event {
                    Some(HandlerEvent::Packet { packet, addr }) => {
                        self.handle_packet(packet, addr).await;
                    }
                    Some(HandlerEvent::Reinvoke { from, seq }) => {
                        self.handle_reinvoke(from, seq).await;
                    }
                    Some(HandlerEvent::Shutdown) | None => break,
                },
            }
        }

        for (_, rumors) in self.pending.drain() {
            for pending in rumors {
                pending.timer.abort();
            }
        }
    }

    async fn handle_raw(&mut self, raw: RawPacket) {
        let packet: GossipPacket = match serialize::from_bytes(&raw.data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Discarded malformed packet from {}: {}", raw.addr, e);
                return;
            }
        };
        self.handle_packet(packet, raw.addr).await;
    }

    async fn handle_packet(&mut self, packet: GossipPacket, addr: SocketAddr) {
        if addr != self.shared.local_addr {
            self.shared.peers.write().await.insert(addr);
        }

        match packet.into_message() {
            Ok(GossipMessage::Rumor(rumor)) => self.handle_rumor(rumor, addr).await,
            Ok(GossipMessage::Status(status)) => self.handle_status(status, addr).await,
            Ok(GossipMessage::Private(private)) => self.handle_private(private, addr).await,
            Err(e) => warn!("Discarded invalid packet from {}: {}", addr, e),
        }
    }

    /// Track a rumor, deliver any newly contiguous run, ack with our
    /// status and keep mongering if the rumor was new.
    async fn handle_rumor(&mut self, rumor: RumorMessage, addr: SocketAddr) {
        let local = self.shared.local_addr;
        let identifier = self.shared.identifier.read().await.clone();

        // A stray echo of our own rumor from the network: answer with
        // our status so the sender can reconcile, but do not re-track.
        if rumor.origin == identifier && addr != local {
            let status = self.shared.status_packet().await;
            self.shared.send_packet_to(&status, addr).await;
            return;
        }

        if addr != local {
            self.shared
                .routes
                .write()
                .await
                .update(&rumor.origin, addr, rumor.id);
        }

        let result = self.shared.store.write().await.track(&rumor);
        let is_new = rumor.id >= result.old_next_id;

        if result.advanced() {
            let run = self
                .shared
                .store
                .read()
                .await
                .range(&rumor.origin, result.old_next_id, result.next_id);
            for delivered in run {
                if addr != local && !delivered.is_route_rumor() {
                    let callback = self.shared.callback.read().await;
                    if let Some(callback) = callback.as_ref() {
                        callback(&delivered.origin, &GossipPacket::from_rumor(delivered.clone()));
                    }
                }
                if let Some(extra) = delivered.extra {
                    // Consensus payloads flow to the layer above even
                    // for locally dispatched rumors.
                    let _ = self.shared.extra_tx.send(extra);
                }
            }
        }

        if addr != local {
            let status = self.shared.status_packet().await;
            self.shared.send_packet_to(&status, addr).await;
        }

        if is_new {
            debug!("New rumor {}:{}, mongering", rumor.origin, rumor.id);
            self.propagate_rumor(rumor, addr, vec![addr]).await;
        }
    }

    /// Reconcile vector clocks: replay what the peer is missing, ask
    /// for what we are missing, or coin-flip to keep mongering.
    async fn handle_status(&mut self, status: StatusPacket, addr: SocketAddr) {
        let (to_send, need_more) = self.shared.store.read().await.diff(&status);
        let synchronized = to_send.is_empty() && !need_more;

        // The status settles every rumor pending on this peer.
        let settled = self.pending.remove(&addr).unwrap_or_default();
        for pending in settled {
            pending.timer.abort();
            if synchronized && rand::random::<f64>() < COIN_FLIP_P {
                debug!("Coin flip, keep mongering {}:{}", pending.rumor.origin, pending.rumor.id);
                self.propagate_rumor(pending.rumor, addr, pending.except)
                    .await;
            }
        }

        if !to_send.is_empty() {
            for peer in to_send {
                let (from, to) = {
                    let store = self.shared.store.read().await;
                    let next = store.next_id_for(&peer.identifier).unwrap_or(1);
                    (peer.next_id, next)
                };
                let missing = self
                    .shared
                    .store
                    .read()
                    .await
                    .range(&peer.identifier, from, to);
                for rumor in missing {
                    self.shared
                        .send_packet_to(&GossipPacket::from_rumor(rumor), addr)
                        .await;
                }
            }
        } else if need_more {
            let status = self.shared.status_packet().await;
            self.shared.send_packet_to(&status, addr).await;
        }
    }

    /// Deliver a private message if it is for us, otherwise forward it
    /// one hop along the routing table.
    async fn handle_private(&mut self, mut private: PrivateMessage, addr: SocketAddr) {
        let local = self.shared.local_addr;
        let identifier = self.shared.identifier.read().await.clone();

        if addr != local {
            self.shared
                .routes
                .write()
                .await
                .update(&private.origin, addr, private.id);
        }

        if private.destination == identifier {
            if addr != local {
                let callback = self.shared.callback.read().await;
                if let Some(callback) = callback.as_ref() {
                    callback(&private.origin, &GossipPacket::from_private(private.clone()));
                }
            }
            return;
        }

        if private.hop_limit == 0 {
            debug!("Dropping private message for {}, hop limit spent", private.destination);
            return;
        }
        private.hop_limit -= 1;

        let next_hop = self
            .shared
            .routes
            .read()
            .await
            .next_hop(&private.destination);
        match next_hop {
            Some(next_hop) => {
                self.shared
                    .send_packet_to(&GossipPacket::from_private(private), next_hop)
                    .await;
            }
            None => {
                debug!("No route towards {}, dropping private message", private.destination);
            }
        }
    }

    /// Send the rumor to a random peer not yet tried and arm a timer
    /// to try the next one if no status comes back.
    async fn propagate_rumor(
        &mut self,
        rumor: RumorMessage,
        from: SocketAddr,
        mut except: Vec<SocketAddr>,
    ) {
        if !except.contains(&self.shared.local_addr) {
            except.push(self.shared.local_addr);
        }
        let Some(peer) = self.shared.random_peer(&except).await else {
            return;
        };
        except.push(peer);

        let seq = self.next_seq;
        self.next_seq += 1;

        let events_tx = self.shared.events_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(REINVOKE_TIMEOUT).await;
            let _ = events_tx.send(HandlerEvent::Reinvoke { from, seq }).await;
        });

        self.pending.entry(from).or_default().push(PendingRumor {
            seq,
            rumor: rumor.clone(),
            except,
            timer,
        });

        self.shared
            .send_packet_to(&GossipPacket::from_rumor(rumor), peer)
            .await;
    }

    /// A reinvoke timer fired without a status ack: pick another peer.
    async fn handle_reinvoke(&mut self, from: SocketAddr, seq: u64) {
        let Some(rumors) = self.pending.get_mut(&from) else {
            return;
        };
        let Some(position) = rumors.iter().position(|p| p.seq == seq) else {
            return;
        };
        let pending = rumors.remove(position);
        if rumors.is_empty() {
            self.pending.remove(&from);
        }
        self.propagate_rumor(pending.rumor, from, pending.except)
            .await;
    }
}
