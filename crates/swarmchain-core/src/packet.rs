use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extra::ExtraMessage;

/// A message originating from a given peer in the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RumorMessage {
    pub origin: String,
    pub id: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraMessage>,
}

impl RumorMessage {
    /// A route rumor carries no payload at all; it only refreshes routes
    /// and is not delivered to the application.
    pub fn is_route_rumor(&self) -> bool {
        self.text.is_empty() && self.extra.is_none()
    }
}

/// How far a node has seen messages coming from one origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub identifier: String,
    pub next_id: u32,
}

/// Vector-clock snapshot of the local message state; starts an
/// anti-entropy exchange.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusPacket {
    pub want: Vec<PeerStatus>,
}

/// A message sent privately to one peer, routed hop by hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub origin: String,
    pub id: u32,
    pub text: String,
    pub destination: String,
    pub hop_limit: u32,
}

/// The packet that gets encoded to or decoded from the network. Exactly
/// one variant must be populated; anything else is malformed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GossipPacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rumor: Option<RumorMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusPacket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<PrivateMessage>,
}

/// The validated form of a packet, dispatched with an explicit match.
#[derive(Debug, Clone, PartialEq)]
pub enum GossipMessage {
    Rumor(RumorMessage),
    Status(StatusPacket),
    Private(PrivateMessage),
}

impl GossipPacket {
    pub fn from_rumor(rumor: RumorMessage) -> Self {
        GossipPacket {
            rumor: Some(rumor),
            ..Default::default()
        }
    }

    pub fn from_status(status: StatusPacket) -> Self {
        GossipPacket {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn from_private(private: PrivateMessage) -> Self {
        GossipPacket {
            private: Some(private),
            ..Default::default()
        }
    }

    /// Validate that exactly one variant is populated and extract it.
    pub fn into_message(self) -> Result<GossipMessage, CoreError> {
        let populated = self.rumor.is_some() as u8
            + self.status.is_some() as u8
            + self.private.is_some() as u8;
        if populated > 1 {
            return Err(CoreError::MalformedPacket);
        }

        if let Some(rumor) = self.rumor {
            Ok(GossipMessage::Rumor(rumor))
        } else if let Some(status) = self.status {
            Ok(GossipMessage::Status(status))
        } else if let Some(private) = self.private {
            Ok(GossipMessage::Private(private))
        } else {
            Err(CoreError::EmptyPacket)
        }
    }
}
