use std::collections::HashMap;
use std::net::SocketAddr;

/// Per-destination next hop, learned from the freshest rumor seen from
/// that origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub next_hop: SocketAddr,
    pub last_id: u32,
}

/// Hop-by-hop routing table, destination identifier to next hop.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `destination -> next_hop`. An existing entry is only
    /// overwritten by a fresher (higher-ID) observation.
    pub fn update(&mut self, destination: &str, next_hop: SocketAddr, id: u32) {
        match self.routes.get_mut(destination) {
            Some(entry) => {
                if id >= entry.last_id {
                    entry.next_hop = next_hop;
                    entry.last_id = id;
                }
            }
            None => {
                self.routes
                    .insert(destination.into(), RouteEntry { next_hop, last_id: id });
            }
        }
    }

    pub fn next_hop(&self, destination: &str) -> Option<SocketAddr> {
        self.routes.get(destination).map(|e| e.next_hop)
    }

    pub fn destinations(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> HashMap<String, RouteEntry> {
        self.routes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = RouteTable::new();
        table.update("B", addr(9001), 1);
        assert_eq!(table.next_hop("B"), Some(addr(9001)));
        assert_eq!(table.next_hop("C"), None);
    }

    #[test]
    fn test_stale_observation_ignored() {
        let mut table = RouteTable::new();
        table.update("B", addr(9001), 5);
        table.update("B", addr(9002), 3);
        assert_eq!(table.next_hop("B"), Some(addr(9001)));
    }

    #[test]
    fn test_fresher_observation_overwrites() {
        let mut table = RouteTable::new();
        table.update("B", addr(9001), 5);
        table.update("B", addr(9002), 6);
        assert_eq!(table.next_hop("B"), Some(addr(9002)));
    }
}
