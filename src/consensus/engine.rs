//! Propose/vote/commit state machine
//!
//! The engine is the single load-bearing abstraction: every binding (UDP
//! node, HTTP surface, in-process test harness) drives the same transitions.
//! All handlers are safe no-ops against state that has already advanced past
//! the event: a VOTE after commit, a COMMIT before the local PROPOSE, a
//! duplicate COMMIT. Message order and delivery counts are never assumed.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::proposal::{Proposal, ProposalTable, Vote};
use super::topology::{PeerContact, Topology};
use super::NodeId;

/// Compute the quorum threshold: `ceil(cluster_size * fraction)`.
///
/// Exact ceiling rounding, never floor or round-half: for the default 2/3
/// fraction this gives 1->1, 3->2, 5->4, 7->5.
pub fn threshold(cluster_size: usize, fraction: f64) -> usize {
    ((cluster_size as f64) * fraction).ceil() as usize
}

/// Key used by the value-only ("broadcast") proposal variant, where the key
/// collapses to the canonical JSON text of the value itself.
pub fn value_key(value: &Value) -> String {
    value.to_string()
}

/// Pluggable acceptance decision for incoming proposals.
///
/// The shipped policy accepts everything; quorum counting supports Reject
/// without any further change, so real validation rules slot in here.
pub trait AcceptancePolicy: Send + Sync {
    fn decide(&self, key: &str, value: &Value) -> Vote;
}

/// Reference policy: vote Accept on every proposal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AcceptancePolicy for AcceptAll {
    fn decide(&self, _key: &str, _value: &Value) -> Vote {
        Vote::Accept
    }
}

/// Engine tunables. Defaults match the reference protocol values.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Quorum fraction `f` in `threshold(N) = ceil(N * f)`.
    pub threshold_fraction: f64,
    /// How long a proposal may sit without reaching quorum before the
    /// sweeper drops it.
    pub proposal_timeout: std::time::Duration,
    /// Target neighbor cardinality `k` applied to topology updates.
    pub neighbor_cardinality: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: 2.0 / 3.0,
            proposal_timeout: std::time::Duration::from_secs(10),
            neighbor_cardinality: crate::consensus::topology::DEFAULT_NEIGHBOR_CARDINALITY,
        }
    }
}

/// Result of handling an incoming PROPOSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposeDecision {
    /// The vote to return to the proposer.
    pub vote: Vote,
    /// Whether this proposal id was unseen until now. Re-flooding only
    /// happens on first sight so duplicated gossip cannot storm.
    pub first_seen: bool,
}

/// Per-node consensus state machine.
pub struct ConsensusEngine {
    node_id: NodeId,
    config: EngineConfig,
    proposals: ProposalTable,
    committed: HashMap<String, Value>,
    topology: Topology,
    policy: Box<dyn AcceptancePolicy>,
}

impl ConsensusEngine {
    pub fn new(node_id: NodeId, config: EngineConfig) -> Self {
        Self::with_policy(node_id, config, Box::new(AcceptAll))
    }

    pub fn with_policy(
        node_id: NodeId,
        config: EngineConfig,
        policy: Box<dyn AcceptancePolicy>,
    ) -> Self {
        Self {
            node_id,
            config,
            proposals: ProposalTable::default(),
            committed: HashMap::new(),
            topology: Topology::default(),
            policy,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Replace the topology view wholesale (membership collaborator only).
    pub fn apply_topology(&mut self, topology: Topology) {
        info!(
            "[Node<{}>] Topology update: {} neighbors, cluster size {}",
            self.node_id,
            topology.neighbor_count(),
            topology.cluster_size()
        );
        self.topology = topology;
    }

    /// Apply a wholesale membership update, bounding the neighbor set to the
    /// configured cardinality `k`.
    pub fn apply_topology_update(&mut self, contacts: Vec<PeerContact>, cluster_size: usize) {
        let topology = Topology::new(
            &self.node_id,
            contacts,
            cluster_size,
            self.config.neighbor_cardinality,
        );
        self.apply_topology(topology);
    }

    /// Quorum threshold for the current cluster size.
    pub fn quorum(&self) -> usize {
        threshold(self.topology.cluster_size(), self.config.threshold_fraction)
    }

    /// Start consensus on `(key, value)`.
    ///
    /// Returns `None` when the key is already committed: committed state is
    /// monotonic within a run and no re-proposal path exists. Otherwise the
    /// proposal is stored with a self-Accept vote and the fresh id returned
    /// for the caller to disseminate.
    pub fn create_proposal(&mut self, key: String, value: Value) -> Option<String> {
        if self.committed.contains_key(&key) {
            debug!(
                "[Node<{}>] Not proposing {}: already committed",
                self.node_id, key
            );
            return None;
        }

        let proposal_id = Uuid::new_v4().to_string()[..8].to_string();
        let mut proposal = Proposal::new(proposal_id.clone(), key.clone(), value.clone());
        proposal.record_vote(self.node_id.clone(), Vote::Accept);
        self.proposals.insert(proposal);

        info!(
            "[Node<{}>] Proposing {}={} (id={})",
            self.node_id, key, value, proposal_id
        );
        Some(proposal_id)
    }

    /// Value-only variant: the key collapses to the value itself.
    pub fn create_value_proposal(&mut self, value: Value) -> Option<String> {
        let key = value_key(&value);
        self.create_proposal(key, value)
    }

    /// Handle an incoming PROPOSE.
    ///
    /// `None` means the underlying key is already committed and the caller
    /// must neither vote nor re-gossip. Otherwise the proposal is recorded
    /// if unseen and the acceptance policy decides the vote.
    pub fn handle_propose(
        &mut self,
        proposal_id: &str,
        key: String,
        value: Value,
        sender: &NodeId,
    ) -> Option<ProposeDecision> {
        if self.committed.contains_key(&key) {
            debug!(
                "[Node<{}>] Ignoring PROPOSE {} from {}: key {} already committed",
                self.node_id, proposal_id, sender, key
            );
            return None;
        }

        let first_seen = !self.proposals.contains(proposal_id);
        if first_seen {
            info!(
                "[Node<{}>] Received PROPOSE {}={} from {} (id={})",
                self.node_id, key, value, sender, proposal_id
            );
            self.proposals
                .insert(Proposal::new(proposal_id.to_string(), key.clone(), value.clone()));
        }

        let vote = self.policy.decide(&key, &value);
        Some(ProposeDecision { vote, first_seen })
    }

    /// Handle an incoming VOTE.
    ///
    /// Unknown proposal references (including votes arriving after commit or
    /// expiry) are absorbed as no-ops. On reaching quorum the proposal is
    /// promoted to committed state, removed from the table along with any
    /// sibling proposal for the same key, and its `(key, value)` returned so
    /// the caller broadcasts COMMIT.
    pub fn handle_vote(
        &mut self,
        proposal_id: &str,
        voter: NodeId,
        vote: Vote,
    ) -> Option<(String, Value)> {
        let quorum = self.quorum();
        let cluster_size = self.topology.cluster_size();

        let Some(proposal) = self.proposals.get(proposal_id) else {
            debug!(
                "[Node<{}>] Ignoring VOTE from {} for unknown proposal {}",
                self.node_id, voter, proposal_id
            );
            return None;
        };

        // A lingering proposal whose key committed through another id is
        // stale: tallying it could produce a second, conflicting commit.
        if self.committed.contains_key(&proposal.key) {
            debug!(
                "[Node<{}>] Dropping stale proposal {}: key {} already committed",
                self.node_id, proposal_id, proposal.key
            );
            self.proposals.remove(proposal_id);
            return None;
        }

        let proposal = self
            .proposals
            .get_mut(proposal_id)
            .expect("proposal present: just looked it up");

        proposal.record_vote(voter, vote);
        let accept_count = proposal.accept_count();
        info!(
            "[Node<{}>] {}/{} accept votes for {} ({} needed)",
            self.node_id, accept_count, cluster_size, proposal_id, quorum
        );

        if accept_count < quorum {
            return None;
        }

        let proposal = self
            .proposals
            .remove(proposal_id)
            .expect("proposal present: just counted its votes");
        let Proposal { key, value, .. } = proposal;
        info!("[Node<{}>] COMMIT {}={}", self.node_id, key, value);
        // Sibling proposals for the same key can never commit now
        self.proposals.remove_by_key(&key);
        self.committed.insert(key.clone(), value.clone());
        Some((key, value))
    }

    /// Handle an incoming COMMIT.
    ///
    /// Returns whether the commit was newly applied; duplicates are
    /// idempotent no-ops and must not be re-flooded by the caller.
    pub fn handle_commit(&mut self, key: String, value: Value) -> bool {
        if self.committed.contains_key(&key) {
            debug!(
                "[Node<{}>] Duplicate COMMIT for {}: no-op",
                self.node_id, key
            );
            return false;
        }

        info!("[Node<{}>] COMMIT {}={} (learned)", self.node_id, key, value);
        self.proposals.remove_by_key(&key);
        self.committed.insert(key, value);
        true
    }

    pub fn is_committed(&self, key: &str) -> bool {
        self.committed.contains_key(key)
    }

    pub fn committed_snapshot(&self) -> HashMap<String, Value> {
        self.committed.clone()
    }

    pub fn pending_proposals(&self) -> usize {
        self.proposals.len()
    }

    pub fn committed_count(&self) -> usize {
        self.committed.len()
    }

    /// Drop proposals that stalled past the configured timeout without
    /// reaching quorum. Committed state is never touched; a dropped value
    /// may be re-proposed later while it remains uncommitted.
    pub fn sweep_expired(&mut self) -> usize {
        let removed = self.proposals.sweep(self.config.proposal_timeout);
        if removed > 0 {
            warn!(
                "[Node<{}>] Expired {} stalled proposal(s)",
                self.node_id, removed
            );
        }
        removed
    }
}

impl std::fmt::Debug for ConsensusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusEngine")
            .field("node_id", &self.node_id)
            .field("pending_proposals", &self.proposals.len())
            .field("committed", &self.committed.len())
            .field("cluster_size", &self.topology.cluster_size())
            .finish()
    }
}
