use std::future::Future;

use swarmchain_core::ExtraMessage;
use swarmchain_gossip::GossipHandle;

/// How consensus messages leave a node. Broadcasting is best effort;
/// the gossip layer handles retransmission and ordering.
pub trait Broadcaster: Clone + Send + Sync + 'static {
    fn broadcast(&self, extra: ExtraMessage) -> impl Future<Output = ()> + Send;
}

impl Broadcaster for GossipHandle {
    fn broadcast(&self, extra: ExtraMessage) -> impl Future<Output = ()> + Send {
        let handle = self.clone();
        async move {
            handle.add_extra_message(extra).await;
        }
    }
}

/// Loopback broadcaster recording every message on a channel.
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct ChannelBroadcaster {
    pub(crate) tx: tokio::sync::mpsc::UnboundedSender<ExtraMessage>,
}

#[cfg(test)]
impl ChannelBroadcaster {
    pub(crate) fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<ExtraMessage>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (ChannelBroadcaster { tx }, rx)
    }
}

#[cfg(test)]
impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, extra: ExtraMessage) -> impl Future<Output = ()> + Send {
        let _ = self.tx.send(extra);
        std::future::ready(())
    }
}
