//! Bounded-cardinality neighbor topology
//!
//! Each node keeps at most `k` neighbors (default 7) plus the total cluster
//! size. The membership collaborator replaces the whole view via a TOPOLOGY
//! message; the consensus engine only ever reads it. Socket addresses ride
//! along for the UDP binding but play no part in quorum arithmetic.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Default target neighbor cardinality.
pub const DEFAULT_NEIGHBOR_CARDINALITY: usize = 7;

/// A reachable peer: identity plus transport address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerContact {
    pub node_id: NodeId,
    pub addr: SocketAddr,
}

/// Per-node topology view: neighbor set plus known cluster size.
#[derive(Clone, Debug)]
pub struct Topology {
    neighbors: Vec<PeerContact>,
    cluster_size: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            neighbors: Vec::new(),
            cluster_size: 1,
        }
    }
}

impl Topology {
    /// Build a topology view from a wholesale membership update.
    ///
    /// Filters out `self_id`, deduplicates by identity and truncates to `k`
    /// neighbors. Cluster size includes self and is clamped to at least 1.
    pub fn new(
        self_id: &NodeId,
        contacts: Vec<PeerContact>,
        cluster_size: usize,
        k: usize,
    ) -> Self {
        let mut neighbors: Vec<PeerContact> = Vec::new();
        for contact in contacts {
            if contact.node_id == *self_id {
                continue;
            }
            if neighbors.iter().any(|n| n.node_id == contact.node_id) {
                continue;
            }
            neighbors.push(contact);
            if neighbors.len() >= k {
                break;
            }
        }

        Self {
            neighbors,
            cluster_size: cluster_size.max(1),
        }
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    pub fn contacts(&self) -> &[PeerContact] {
        &self.neighbors
    }

    pub fn neighbor_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.neighbors.iter().map(|n| &n.node_id)
    }

    pub fn is_neighbor(&self, node_id: &NodeId) -> bool {
        self.neighbors.iter().any(|n| n.node_id == *node_id)
    }

    pub fn addr_of(&self, node_id: &NodeId) -> Option<SocketAddr> {
        self.neighbors
            .iter()
            .find(|n| n.node_id == *node_id)
            .map(|n| n.addr)
    }
}
