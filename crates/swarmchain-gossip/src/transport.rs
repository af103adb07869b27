use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::GossipError;

/// Maximum datagram size accepted from the network.
const MAX_DATAGRAM: usize = 65_507;

/// Capacity of the inbound and outbound packet queues.
const QUEUE_CAPACITY: usize = 1024;

/// A raw datagram, either received from or destined to `addr`.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub data: Vec<u8>,
    pub addr: SocketAddr,
}

/// Unreliable packet send/receive primitive. Packets can be lost; the
/// layers above retry.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind a UDP socket on the given address ("ip:port", port 0 picks a
    /// free one).
    pub async fn bind(addr: &str) -> Result<Self, GossipError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(GossipError::Io)?;
        let local_addr = socket.local_addr()?;
        Ok(UdpTransport {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the reader and writer tasks. Returns the inbound packet
    /// stream, the outbound packet sink and the task handles (abort the
    /// reader to stop listening; drop the sink to stop the writer).
    pub fn start(
        &self,
    ) -> (
        mpsc::Receiver<RawPacket>,
        mpsc::Sender<RawPacket>,
        JoinHandle<()>,
        JoinHandle<()>,
    ) {
        let (in_tx, in_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel::<RawPacket>(QUEUE_CAPACITY);

        let socket = Arc::clone(&self.socket);
        let reader = tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM];
            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((0, _)) => {
                        // Empty datagram, discard
                    }
                    Ok((len, src)) => {
                        let packet = RawPacket {
                            data: buffer[..len].to_vec(),
                            addr: src,
                        };
                        if in_tx.send(packet).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Discarded inbound datagram: {}", e);
                    }
                }
            }
        });

        let socket = Arc::clone(&self.socket);
        let writer = tokio::spawn(async move {
            while let Some(packet) = out_rx.recv().await {
                if let Err(e) = socket.send_to(&packet.data, packet.addr).await {
                    // Best effort, the mongering retry covers the loss
                    warn!("Discarded outbound datagram to {}: {}", packet.addr, e);
                }
            }
        });

        (in_rx, out_tx, reader, writer)
    }
}
