//! JSON wire encoding helpers.
//!
//! Datagrams carry one JSON-encoded [`GossipPacket`](crate::GossipPacket)
//! each; decoding failures discard the single packet.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::CoreError;

/// Serialize a value to JSON bytes
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec(value).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Deserialize a value from JSON bytes
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{GossipPacket, PeerStatus, StatusPacket};

    #[test]
    fn test_packet_roundtrip() {
        let packet = GossipPacket::from_status(StatusPacket {
            want: vec![PeerStatus {
                identifier: "nodeA".into(),
                next_id: 4,
            }],
        });
        let bytes = to_bytes(&packet).unwrap();
        let back: GossipPacket = from_bytes(&bytes).unwrap();
        assert_eq!(back, packet);
    }

    #[test]
    fn test_garbage_rejected() {
        let res: Result<GossipPacket, _> = from_bytes(b"not json at all");
        assert!(res.is_err());
    }
}
