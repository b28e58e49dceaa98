//! Threshold consensus core
//!
//! One `ConsensusEngine` per node holds the proposal table, the committed
//! state and the topology view. Everything here is synchronous and free of
//! I/O so that multiple simulated nodes can coexist in a single process;
//! the node layer serializes access and hands outbound messages to the
//! transport after mutation completes.

pub mod engine;
pub mod proposal;
pub mod topology;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use engine::{
    threshold, value_key, AcceptAll, AcceptancePolicy, ConsensusEngine, EngineConfig,
    ProposeDecision,
};
pub use proposal::{Proposal, ProposalTable, Vote};
pub use topology::{PeerContact, Topology};

/// Opaque identifier for a cluster member.
///
/// Used as a map key for votes and peers and as message source/destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
