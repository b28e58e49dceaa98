//! Flood dissemination policy
//!
//! Pure planning layer between the consensus engine and whatever transport a
//! binding uses: every inbound protocol event maps to a list of outbound
//! messages addressed by identity, never by socket. The rules:
//!
//! - PROPOSE accepted: VOTE goes point-to-point to the proposer, and the
//!   PROPOSE re-floods to all neighbors except the immediate sender (first
//!   sight only).
//! - VOTE causing commit: COMMIT broadcasts to all neighbors.
//! - COMMIT newly applied: COMMIT re-floods to all neighbors except the
//!   sender, so a connected topology saturates even under partial edge loss.
//!
//! Bounded fan-out plus multi-hop re-flooding reaches the whole cluster; the
//! duplicates this produces are absorbed by engine idempotence.

use crate::consensus::{ConsensusEngine, NodeId, Vote};
use crate::gossip::messages::{unix_timestamp, WireMessage};
use serde_json::Value;

/// Addressing for an outbound message, resolved against the node's own
/// neighbor set by the binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Point-to-point to one peer (used for votes to the proposer).
    Peer(NodeId),
    /// Every current neighbor.
    AllNeighbors,
    /// Every current neighbor except the named one.
    AllNeighborsExcept(NodeId),
}

/// One planned outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub message: WireMessage,
}

/// Start consensus on a locally originated proposal.
///
/// Returns the proposal id (or `None` when the key is already committed)
/// plus the PROPOSE fan-out plan.
pub fn plan_local_propose(
    engine: &mut ConsensusEngine,
    key: String,
    value: Value,
) -> (Option<String>, Vec<Outbound>) {
    let Some(proposal_id) = engine.create_proposal(key.clone(), value.clone()) else {
        return (None, Vec::new());
    };

    // The self-vote alone may already meet quorum (single-node cluster or a
    // low threshold fraction); re-checking it through the vote path commits
    // without waiting for peers.
    let self_id = engine.node_id().clone();
    if let Some((key, value)) = engine.handle_vote(&proposal_id, self_id.clone(), Vote::Accept) {
        let plan = vec![Outbound {
            to: Recipient::AllNeighbors,
            message: WireMessage::Commit {
                proposal_id: proposal_id.clone(),
                key,
                value,
                from: self_id,
            },
        }];
        return (Some(proposal_id), plan);
    }

    let propose = WireMessage::Propose {
        proposal_id: proposal_id.clone(),
        from: self_id,
        key,
        value,
        timestamp: unix_timestamp(),
    };
    let plan = vec![Outbound {
        to: Recipient::AllNeighbors,
        message: propose,
    }];
    (Some(proposal_id), plan)
}

/// Apply one inbound protocol message and plan the resulting outbound
/// messages.
///
/// `sender` is the immediate sender as resolved by the binding (envelope
/// source for message-passing harnesses, reverse address lookup for the UDP
/// binding). Stale and duplicate events produce an empty plan.
pub fn handle_message(
    engine: &mut ConsensusEngine,
    sender: &NodeId,
    message: WireMessage,
) -> Vec<Outbound> {
    match message {
        WireMessage::Propose {
            proposal_id,
            from,
            key,
            value,
            timestamp,
        } => {
            let Some(decision) = engine.handle_propose(&proposal_id, key.clone(), value.clone(), sender)
            else {
                return Vec::new();
            };

            let mut plan = vec![Outbound {
                to: Recipient::Peer(from.clone()),
                message: WireMessage::Vote {
                    proposal_id: proposal_id.clone(),
                    from: engine.node_id().clone(),
                    vote: decision.vote,
                },
            }];

            // Re-flood on first sight only, and only for proposals we
            // accept; a rejected proposal is not worth propagating.
            if decision.first_seen && decision.vote == Vote::Accept {
                plan.push(Outbound {
                    to: Recipient::AllNeighborsExcept(sender.clone()),
                    message: WireMessage::Propose {
                        proposal_id,
                        from,
                        key,
                        value,
                        timestamp,
                    },
                });
            }
            plan
        }

        WireMessage::Vote {
            proposal_id,
            from,
            vote,
        } => {
            let Some((key, value)) = engine.handle_vote(&proposal_id, from, vote) else {
                return Vec::new();
            };

            vec![Outbound {
                to: Recipient::AllNeighbors,
                message: WireMessage::Commit {
                    proposal_id,
                    key,
                    value,
                    from: engine.node_id().clone(),
                },
            }]
        }

        WireMessage::Commit {
            proposal_id,
            key,
            value,
            ..
        } => {
            if !engine.handle_commit(key.clone(), value.clone()) {
                return Vec::new();
            }

            vec![Outbound {
                to: Recipient::AllNeighborsExcept(sender.clone()),
                message: WireMessage::Commit {
                    proposal_id,
                    key,
                    value,
                    from: engine.node_id().clone(),
                },
            }]
        }

        WireMessage::Topology {
            neighbors,
            cluster_size,
        } => {
            engine.apply_topology_update(neighbors, cluster_size);
            Vec::new()
        }
    }
}
