use std::collections::HashMap;

use swarmchain_core::{PeerStatus, RumorMessage, StatusPacket};

/// Tracking window for one origin: buffered out-of-order rumors plus the
/// next expected contiguous ID.
#[derive(Debug, Default)]
struct TrackingWindow {
    messages: HashMap<u32, RumorMessage>,
    next_id: u32,
}

/// Result of tracking one rumor. `old_next_id..next_id` is the newly
/// contiguous run that became deliverable (empty when nothing advanced).
#[derive(Debug, Clone, Copy)]
pub struct TrackResult {
    pub next_id: u32,
    pub old_next_id: u32,
}

impl TrackResult {
    pub fn advanced(&self) -> bool {
        self.next_id > self.old_next_id
    }
}

/// All rumors seen so far, one tracking window per origin. The next
/// expected IDs form this node's vector clock.
#[derive(Debug, Default)]
pub struct RumorStore {
    origins: HashMap<String, TrackingWindow>,
}

impl RumorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rumor and advance the contiguous window if possible.
    ///
    /// The very first message from an origin bootstraps the window: ID 0
    /// counts as implicitly seen, so a first message with ID 1 puts the
    /// window at 2, anything else leaves it at 1.
    pub fn track(&mut self, msg: &RumorMessage) -> TrackResult {
        if let Some(window) = self.origins.get_mut(&msg.origin) {
            let old_next_id = window.next_id;
            window.messages.insert(msg.id, msg.clone());
            if window.next_id != msg.id {
                return TrackResult {
                    next_id: old_next_id,
                    old_next_id,
                };
            }
            window.next_id += 1;
            while window.messages.contains_key(&window.next_id) {
                window.next_id += 1;
            }
            return TrackResult {
                next_id: window.next_id,
                old_next_id,
            };
        }

        let next_id = if msg.id == 1 { 2 } else { 1 };
        let mut window = TrackingWindow {
            messages: HashMap::new(),
            next_id,
        };
        window.messages.insert(msg.id, msg.clone());
        self.origins.insert(msg.origin.clone(), window);
        TrackResult {
            next_id,
            old_next_id: 1,
        }
    }

    /// Clone the rumors of one origin in the ID range `from..to`,
    /// increasing order.
    pub fn range(&self, origin: &str, from: u32, to: u32) -> Vec<RumorMessage> {
        let Some(window) = self.origins.get(origin) else {
            return Vec::new();
        };
        (from..to)
            .filter_map(|id| window.messages.get(&id).cloned())
            .collect()
    }

    pub fn next_id_for(&self, origin: &str) -> Option<u32> {
        self.origins.get(origin).map(|w| w.next_id)
    }

    /// Snapshot the vector clock as a status packet.
    pub fn status(&self) -> StatusPacket {
        StatusPacket {
            want: self
                .origins
                .iter()
                .map(|(origin, window)| PeerStatus {
                    identifier: origin.clone(),
                    next_id: window.next_id,
                })
                .collect(),
        }
    }

    /// Compare a peer's vector clock against the local one.
    ///
    /// Returns the per-origin entries the peer is missing (with the ID
    /// they should be replayed from) and whether the peer is strictly
    /// ahead somewhere, meaning this node should ask for more.
    pub fn diff(&self, theirs: &StatusPacket) -> (Vec<PeerStatus>, bool) {
        let mut to_send = Vec::new();

        for (origin, window) in &self.origins {
            match theirs.want.iter().find(|p| &p.identifier == origin) {
                Some(peer) => {
                    if peer.next_id < window.next_id {
                        to_send.push(peer.clone());
                    }
                }
                None => to_send.push(PeerStatus {
                    identifier: origin.clone(),
                    next_id: 1,
                }),
            }
        }

        let mut need_more = false;
        if to_send.is_empty() {
            for peer in &theirs.want {
                let behind = match self.origins.get(&peer.identifier) {
                    Some(window) => window.next_id < peer.next_id,
                    None => true,
                };
                if behind {
                    need_more = true;
                    break;
                }
            }
        }

        (to_send, need_more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rumor(origin: &str, id: u32) -> RumorMessage {
        RumorMessage {
            origin: origin.into(),
            id,
            text: format!("msg {}", id),
            extra: None,
        }
    }

    #[test]
    fn test_first_message_id_one_bootstraps_to_two() {
        let mut store = RumorStore::new();
        let res = store.track(&rumor("A", 1));
        assert_eq!(res.next_id, 2);
        assert_eq!(res.old_next_id, 1);
        assert!(res.advanced());
    }

    #[test]
    fn test_first_message_out_of_order_buffers() {
        let mut store = RumorStore::new();
        let res = store.track(&rumor("A", 3));
        assert_eq!(res.next_id, 1);
        assert!(!res.advanced());
    }

    #[test]
    fn test_gap_fills_advance_contiguously() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));
        store.track(&rumor("A", 3));
        store.track(&rumor("A", 4));
        // Window stuck at 2 until the gap closes
        assert_eq!(store.next_id_for("A"), Some(2));

        let res = store.track(&rumor("A", 2));
        assert_eq!(res.old_next_id, 2);
        assert_eq!(res.next_id, 5);

        let run = store.range("A", res.old_next_id, res.next_id);
        let ids: Vec<u32> = run.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_duplicate_does_not_advance() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));
        let res = store.track(&rumor("A", 1));
        assert!(!res.advanced());
        assert_eq!(store.next_id_for("A"), Some(2));
    }

    #[test]
    fn test_status_snapshot() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));
        store.track(&rumor("B", 1));
        store.track(&rumor("B", 2));

        let status = store.status();
        assert_eq!(status.want.len(), 2);
        let b = status.want.iter().find(|p| p.identifier == "B").unwrap();
        assert_eq!(b.next_id, 3);
    }

    #[test]
    fn test_diff_peer_behind() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));
        store.track(&rumor("A", 2));

        let theirs = StatusPacket {
            want: vec![PeerStatus {
                identifier: "A".into(),
                next_id: 2,
            }],
        };
        let (to_send, need_more) = store.diff(&theirs);
        assert_eq!(to_send.len(), 1);
        assert_eq!(to_send[0].next_id, 2);
        assert!(!need_more);
    }

    #[test]
    fn test_diff_peer_unknown_origin() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));

        let (to_send, _) = store.diff(&StatusPacket::default());
        assert_eq!(to_send.len(), 1);
        assert_eq!(to_send[0].next_id, 1);
    }

    #[test]
    fn test_diff_peer_ahead() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));

        let theirs = StatusPacket {
            want: vec![
                PeerStatus {
                    identifier: "A".into(),
                    next_id: 2,
                },
                PeerStatus {
                    identifier: "B".into(),
                    next_id: 4,
                },
            ],
        };
        let (to_send, need_more) = store.diff(&theirs);
        assert!(to_send.is_empty());
        assert!(need_more);
    }

    #[test]
    fn test_diff_synchronized() {
        let mut store = RumorStore::new();
        store.track(&rumor("A", 1));

        let theirs = StatusPacket {
            want: vec![PeerStatus {
                identifier: "A".into(),
                next_id: 2,
            }],
        };
        let (to_send, need_more) = store.diff(&theirs);
        assert!(to_send.is_empty());
        assert!(!need_more);
    }
}
