//! Protocol message types
//!
//! All messages use serde traits and are serialized as JSON objects tagged
//! with a `type` field, both on the UDP wire and on the HTTP surface. The
//! payload slot is an opaque `serde_json::Value`, validated only at the
//! deserialization boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::consensus::{NodeId, PeerContact, Vote};

/// All protocol messages exchanged between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Initiate consensus on a key-value change. `from` is the original
    /// proposer and is preserved across re-floods; votes are addressed to
    /// it directly.
    #[serde(rename = "PROPOSE")]
    Propose {
        proposal_id: String,
        from: NodeId,
        key: String,
        value: Value,
        timestamp: u64,
    },

    /// Vote on a proposal, sent point-to-point to the proposer.
    #[serde(rename = "VOTE")]
    Vote {
        proposal_id: String,
        from: NodeId,
        vote: Vote,
    },

    /// Finalize a proposal once quorum is reached. `from` is the immediate
    /// sender, so receivers can re-flood to all-but-sender.
    #[serde(rename = "COMMIT")]
    Commit {
        proposal_id: String,
        key: String,
        value: Value,
        from: NodeId,
    },

    /// Wholesale topology replacement from the membership collaborator.
    #[serde(rename = "TOPOLOGY")]
    Topology {
        neighbors: Vec<PeerContact>,
        cluster_size: usize,
    },
}

impl WireMessage {
    /// Serialize message to JSON bytes for the datagram wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Current Unix timestamp in seconds. Informational on the wire only;
/// expiry uses the monotonic clock in the proposal table.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
