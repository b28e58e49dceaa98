//! Proposal table: unresolved proposals awaiting quorum
//!
//! Entries live here from creation until promotion to committed state or
//! removal by the expiry sweeper, never both. Creation times use a
//! monotonic clock so wall-clock adjustments cannot expire (or immortalize)
//! a proposal; the wire timestamp is separate and informational only.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodeId;

/// Vote decision on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Accept,
    Reject,
}

/// A candidate (key, value) commit awaiting quorum agreement.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub proposal_id: String,
    pub key: String,
    pub value: Value,
    pub created_at: Instant,
    pub votes: HashMap<NodeId, Vote>,
}

impl Proposal {
    pub fn new(proposal_id: String, key: String, value: Value) -> Self {
        Self {
            proposal_id,
            key,
            value,
            created_at: Instant::now(),
            votes: HashMap::new(),
        }
    }

    /// Record a vote. Votes accumulate monotonically: the first vote from a
    /// given node wins and later ones are ignored. Returns whether the vote
    /// was newly recorded.
    pub fn record_vote(&mut self, voter: NodeId, vote: Vote) -> bool {
        match self.votes.entry(voter) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(vote);
                true
            }
        }
    }

    pub fn accept_count(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Accept).count()
    }

    pub fn reject_count(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Reject).count()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// In-memory record of all unresolved proposals, keyed by proposal id.
#[derive(Debug, Default)]
pub struct ProposalTable {
    entries: HashMap<String, Proposal>,
}

impl ProposalTable {
    pub fn insert(&mut self, proposal: Proposal) {
        self.entries.insert(proposal.proposal_id.clone(), proposal);
    }

    pub fn contains(&self, proposal_id: &str) -> bool {
        self.entries.contains_key(proposal_id)
    }

    pub fn get(&self, proposal_id: &str) -> Option<&Proposal> {
        self.entries.get(proposal_id)
    }

    pub fn get_mut(&mut self, proposal_id: &str) -> Option<&mut Proposal> {
        self.entries.get_mut(proposal_id)
    }

    pub fn remove(&mut self, proposal_id: &str) -> Option<Proposal> {
        self.entries.remove(proposal_id)
    }

    /// Drop every pending proposal for `key` (used when a COMMIT for the key
    /// arrives from elsewhere).
    pub fn remove_by_key(&mut self, key: &str) {
        self.entries.retain(|_, p| p.key != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove proposals older than `timeout`, returning how many were
    /// dropped. Expiry only bounds memory growth; it never touches
    /// committed state.
    pub fn sweep(&mut self, timeout: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, p| p.age() <= timeout);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vote_recording_is_monotonic() {
        let mut proposal = Proposal::new("p1".into(), "k".into(), json!(1));

        assert!(proposal.record_vote(NodeId::from("a"), Vote::Accept));
        assert!(!proposal.record_vote(NodeId::from("a"), Vote::Reject));

        assert_eq!(proposal.accept_count(), 1);
        assert_eq!(proposal.reject_count(), 0);
    }

    #[test]
    fn test_remove_by_key() {
        let mut table = ProposalTable::default();
        table.insert(Proposal::new("p1".into(), "k".into(), json!(1)));
        table.insert(Proposal::new("p2".into(), "k".into(), json!(2)));
        table.insert(Proposal::new("p3".into(), "other".into(), json!(3)));

        table.remove_by_key("k");

        assert_eq!(table.len(), 1);
        assert!(table.contains("p3"));
    }

    #[test]
    fn test_sweep_respects_timeout() {
        let mut table = ProposalTable::default();
        let mut stale = Proposal::new("old".into(), "k".into(), json!(1));
        stale.created_at = Instant::now() - Duration::from_secs(11);
        table.insert(stale);
        table.insert(Proposal::new("fresh".into(), "k2".into(), json!(2)));

        let removed = table.sweep(Duration::from_secs(10));

        assert_eq!(removed, 1);
        assert!(!table.contains("old"));
        assert!(table.contains("fresh"));
    }
}
