use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::IteratorRandom;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use swarmchain_core::{
    serialize, ExtraMessage, GossipPacket, PrivateMessage, RumorMessage, StatusPacket,
};

use crate::error::GossipError;
use crate::handler::{Handler, HandlerEvent};
use crate::routes::{RouteEntry, RouteTable};
use crate::tracking::RumorStore;
use crate::transport::{RawPacket, UdpTransport};

/// Callback invoked once per newly delivered, in-order rumor or private
/// message.
pub type NewMessageCallback = Box<dyn Fn(&str, &GossipPacket) + Send + Sync>;

/// Gossiper configuration.
#[derive(Debug, Clone)]
pub struct GossiperConfig {
    /// UDP bind address, port 0 picks a free one.
    pub bind_addr: String,
    /// Identifier sent with messages originating from this node.
    pub identifier: String,
    /// Anti-entropy period in seconds (0 falls back to the default 10).
    pub anti_entropy_secs: u64,
    /// Route-rumor period in seconds, 0 disables route rumors.
    pub route_timer_secs: u64,
}

impl Default for GossiperConfig {
    fn default() -> Self {
        GossiperConfig {
            bind_addr: "127.0.0.1:0".into(),
            identifier: "peer".into(),
            anti_entropy_secs: 10,
            route_timer_secs: 0,
        }
    }
}

/// State shared between the handler task, the tickers and the handle.
pub(crate) struct Shared {
    pub(crate) local_addr: SocketAddr,
    pub(crate) identifier: RwLock<String>,
    pub(crate) peers: RwLock<HashSet<SocketAddr>>,
    pub(crate) routes: RwLock<RouteTable>,
    pub(crate) store: RwLock<RumorStore>,
    pub(crate) callback: RwLock<Option<NewMessageCallback>>,
    next_id: AtomicU32,
    pub(crate) events_tx: mpsc::Sender<HandlerEvent>,
    pub(crate) out_tx: mpsc::Sender<RawPacket>,
    pub(crate) extra_tx: mpsc::UnboundedSender<ExtraMessage>,
}

impl Shared {
    /// Encode and send a packet, best effort. A closed writer during
    /// shutdown is benign: a stopped node intentionally drops in-flight
    /// retries.
    pub(crate) async fn send_packet_to(&self, packet: &GossipPacket, addr: SocketAddr) {
        let data = match serialize::to_bytes(packet) {
            Ok(data) => data,
            Err(e) => {
                debug!("Discard invalid message while encoding: {}", e);
                return;
            }
        };
        if self.out_tx.send(RawPacket { data, addr }).await.is_err() {
            debug!("Sender closed, dropping packet to {}", addr);
        }
    }

    /// Current vector clock as a status packet (copy-on-read).
    pub(crate) async fn status_packet(&self) -> GossipPacket {
        GossipPacket::from_status(self.store.read().await.status())
    }

    /// Pick one known peer uniformly at random, excluding `except`.
    pub(crate) async fn random_peer(&self, except: &[SocketAddr]) -> Option<SocketAddr> {
        let peers = self.peers.read().await;
        peers
            .iter()
            .copied()
            .filter(|p| !except.contains(p))
            .choose(&mut rand::thread_rng())
    }

    pub(crate) fn next_rumor_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Cloneable handle for interacting with a running gossiper: firing
/// rumors, private messages and consensus payloads, and inspecting the
/// node and routing tables.
#[derive(Clone)]
pub struct GossipHandle {
    shared: Arc<Shared>,
}

impl GossipHandle {
    /// Fire a new rumor under this node's identity. Returns its ID.
    pub async fn add_message(&self, text: &str) -> u32 {
        let id = self.shared.next_rumor_id();
        let rumor = RumorMessage {
            origin: self.get_identifier().await,
            id,
            text: text.into(),
            extra: None,
        };
        self.dispatch_local(GossipPacket::from_rumor(rumor)).await;
        id
    }

    /// Fire a rumor carrying a consensus payload. Returns its ID.
    pub async fn add_extra_message(&self, extra: ExtraMessage) -> u32 {
        let id = self.shared.next_rumor_id();
        let rumor = RumorMessage {
            origin: self.get_identifier().await,
            id,
            text: String::new(),
            extra: Some(extra),
        };
        self.dispatch_local(GossipPacket::from_rumor(rumor)).await;
        id
    }

    /// Send a private message towards `dest` through the routing table.
    pub async fn add_private_message(&self, text: &str, dest: &str, origin: &str, hop_limit: u32) {
        let private = PrivateMessage {
            origin: origin.into(),
            id: 0,
            text: text.into(),
            destination: dest.into(),
            hop_limit,
        };
        self.dispatch_local(GossipPacket::from_private(private)).await;
    }

    /// Register node addresses this gossiper can contact.
    pub async fn add_addresses(&self, addresses: &[String]) -> Result<(), GossipError> {
        for a in addresses {
            let addr: SocketAddr = a
                .parse()
                .map_err(|_| GossipError::InvalidAddress(a.clone()))?;
            if addr != self.shared.local_addr {
                self.shared.peers.write().await.insert(addr);
            }
        }
        Ok(())
    }

    /// Update the routing table with a next hop for the given peer.
    pub async fn add_route(&self, peer_name: &str, next_hop: &str) -> Result<(), GossipError> {
        let addr: SocketAddr = next_hop
            .parse()
            .map_err(|_| GossipError::InvalidAddress(next_hop.into()))?;
        if addr != self.shared.local_addr {
            self.shared.routes.write().await.update(peer_name, addr, 0);
        }
        Ok(())
    }

    /// Broadcast a packet to every known host.
    pub async fn broadcast_message(&self, packet: &GossipPacket) {
        let peers: Vec<SocketAddr> = self.shared.peers.read().await.iter().copied().collect();
        for peer in peers {
            self.shared.send_packet_to(packet, peer).await;
        }
    }

    /// Send a packet to one host.
    pub async fn send_message_to(&self, packet: &GossipPacket, addr: &str) -> Result<(), GossipError> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| GossipError::InvalidAddress(addr.into()))?;
        self.shared.send_packet_to(packet, addr).await;
        Ok(())
    }

    /// The current status packet (vector-clock snapshot).
    pub async fn status_packet(&self) -> StatusPacket {
        self.shared.store.read().await.status()
    }

    pub async fn get_nodes(&self) -> Vec<String> {
        self.shared
            .peers
            .read()
            .await
            .iter()
            .map(|a| a.to_string())
            .collect()
    }

    /// Nodes whose routes are known to this node.
    pub async fn get_direct_nodes(&self) -> Vec<String> {
        self.shared.routes.read().await.destinations()
    }

    pub async fn get_routing_table(&self) -> HashMap<String, RouteEntry> {
        self.shared.routes.read().await.snapshot()
    }

    pub async fn get_identifier(&self) -> String {
        self.shared.identifier.read().await.clone()
    }

    pub async fn set_identifier(&self, id: &str) {
        *self.shared.identifier.write().await = id.into();
    }

    pub fn get_local_addr(&self) -> String {
        self.shared.local_addr.to_string()
    }

    async fn dispatch_local(&self, packet: GossipPacket) {
        let event = HandlerEvent::Packet {
            packet,
            addr: self.shared.local_addr,
        };
        if self.shared.events_tx.send(event).await.is_err() {
            debug!("Handler closed, dropping local packet");
        }
    }
}

/// The gossip protocol engine. Construct with [`Gossiper::new`], then
/// call [`run`](Gossiper::run) to start processing packets.
pub struct Gossiper {
    config: GossiperConfig,
    shared: Arc<Shared>,
    raw_rx: std::sync::Mutex<Option<mpsc::Receiver<RawPacket>>>,
    events_rx: std::sync::Mutex<Option<mpsc::Receiver<HandlerEvent>>>,
    extra_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<ExtraMessage>>>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity of the serialized handler event queue.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Default anti-entropy period, seconds.
const DEFAULT_ANTI_ENTROPY_SECS: u64 = 10;

impl Gossiper {
    /// Bind the UDP socket and set up the packet pipeline. The protocol
    /// does not run until [`run`](Gossiper::run) is called.
    pub async fn new(mut config: GossiperConfig) -> Result<Self, GossipError> {
        if config.anti_entropy_secs == 0 {
            config.anti_entropy_secs = DEFAULT_ANTI_ENTROPY_SECS;
        }

        let transport = UdpTransport::bind(&config.bind_addr).await?;
        let local_addr = transport.local_addr();
        let (raw_rx, out_tx, reader, writer) = transport.start();

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (extra_tx, extra_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            local_addr,
            identifier: RwLock::new(config.identifier.clone()),
            peers: RwLock::new(HashSet::new()),
            routes: RwLock::new(RouteTable::new()),
            store: RwLock::new(RumorStore::new()),
            callback: RwLock::new(None),
            next_id: AtomicU32::new(1),
            events_tx,
            out_tx,
            extra_tx,
        });

        info!(
            "Gossiper created {} at {}",
            config.identifier, local_addr
        );

        Ok(Gossiper {
            config,
            shared,
            raw_rx: std::sync::Mutex::new(Some(raw_rx)),
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            extra_rx: std::sync::Mutex::new(Some(extra_rx)),
            tasks: std::sync::Mutex::new(vec![reader, writer]),
        })
    }

    pub fn handle(&self) -> GossipHandle {
        GossipHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Take the stream of consensus payloads delivered by the gossip
    /// layer, in per-origin contiguous order. Can be taken once.
    pub fn extra_messages(&self) -> Option<mpsc::UnboundedReceiver<ExtraMessage>> {
        self.extra_rx.lock().ok()?.take()
    }

    /// Set the callback invoked once per newly delivered message.
    pub async fn register_callback(&self, callback: NewMessageCallback) {
        *self.shared.callback.write().await = Some(callback);
    }

    pub fn get_local_addr(&self) -> String {
        self.shared.local_addr.to_string()
    }

    /// Run the gossip protocol. `ready` fires once the node is
    /// processing packets. Blocks until [`stop`](Gossiper::stop).
    pub async fn run(&self, ready: oneshot::Sender<()>) {
        let raw_rx = self
            .raw_rx
            .lock()
            .ok()
            .and_then(|mut g| g.take());
        let events_rx = self
            .events_rx
            .lock()
            .ok()
            .and_then(|mut g| g.take());
        let (Some(raw_rx), Some(events_rx)) = (raw_rx, events_rx) else {
            debug!("Gossiper already running");
            return;
        };

        self.start_anti_entropy();
        self.start_route_rumors();

        let _ = ready.send(());

        let handler = Handler::new(Arc::clone(&self.shared));
        handler.run(raw_rx, events_rx).await;
    }

    /// Stop the gossiper: close the handler queue and cancel the
    /// tickers and transport tasks. In-flight retries are dropped.
    pub async fn stop(&self) {
        let _ = self.shared.events_tx.send(HandlerEvent::Shutdown).await;
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }

    /// Periodically send our status to a random peer to reconcile
    /// missed rumors.
    fn start_anti_entropy(&self) {
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_secs(self.config.anti_entropy_secs);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick is immediate, skip it
            loop {
                ticker.tick().await;
                if let Some(peer) = shared.random_peer(&[]).await {
                    let status = shared.status_packet().await;
                    shared.send_packet_to(&status, peer).await;
                }
            }
        });
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }

    /// Periodically gossip an empty rumor so peers learn a route back
    /// to this node.
    fn start_route_rumors(&self) {
        if self.config.route_timer_secs == 0 {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_secs(self.config.route_timer_secs);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let rumor = RumorMessage {
                    origin: shared.identifier.read().await.clone(),
                    id: shared.next_rumor_id(),
                    text: String::new(),
                    extra: None,
                };
                let event = HandlerEvent::Packet {
                    packet: GossipPacket::from_rumor(rumor),
                    addr: shared.local_addr,
                };
                if shared.events_tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }
}
