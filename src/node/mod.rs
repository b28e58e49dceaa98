//! Node binding: one consensus engine wired to a datagram transport
//!
//! All engine access goes through a single mutex, so every protocol event is
//! applied atomically and in some serial order. Outbound sends are planned
//! while the lock is held but dispatched only after it is released; the
//! transport never runs under engine state.

pub mod console;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::consensus::{ConsensusEngine, NodeId, PeerContact};
use crate::error::Result;
use crate::gossip::{handle_message, plan_local_propose, Outbound, Recipient, WireMessage};
use crate::transport::PeerSender;

/// Point-in-time view of a node for the HTTP status surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub cluster_size: usize,
    pub quorum: usize,
    pub neighbor_count: usize,
    pub pending_proposals: usize,
    pub committed_entries: usize,
}

pub struct ConsensusNode {
    node_id: NodeId,
    engine: Mutex<ConsensusEngine>,
    sender: Arc<dyn PeerSender>,
}

impl ConsensusNode {
    pub fn new(engine: ConsensusEngine, sender: Arc<dyn PeerSender>) -> Self {
        Self {
            node_id: engine.node_id().clone(),
            engine: Mutex::new(engine),
            sender,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Start consensus on a keyed value. Returns `None` when the key is
    /// already committed locally.
    pub async fn propose(&self, key: String, value: Value) -> Result<Option<String>> {
        let (proposal_id, sends) = {
            let mut engine = self.engine.lock()?;
            let (proposal_id, plan) = plan_local_propose(&mut engine, key, value);
            let sends = resolve_plan(&engine, plan, None)?;
            (proposal_id, sends)
        };
        self.dispatch(sends).await;
        Ok(proposal_id)
    }

    /// Value-only variant: the key is the value's canonical form.
    pub async fn propose_value(&self, value: Value) -> Result<Option<String>> {
        let key = crate::consensus::value_key(&value);
        self.propose(key, value).await
    }

    /// Decode and apply one inbound datagram.
    pub async fn handle_datagram(&self, data: &[u8], source: SocketAddr) -> Result<()> {
        let message = match WireMessage::from_bytes(data) {
            Ok(message) => message,
            Err(e) => {
                warn!("[Node<{}>] Dropping malformed datagram from {}: {}", self.node_id, source, e);
                return Ok(());
            }
        };

        let sends = {
            let mut engine = self.engine.lock()?;
            let sender_id = resolve_sender(&engine, source, &message);
            let plan = handle_message(&mut engine, &sender_id, message);
            resolve_plan(&engine, plan, Some(source))?
        };
        self.dispatch(sends).await;
        Ok(())
    }

    /// Replace the neighbor set and cluster size wholesale.
    pub fn apply_topology(&self, contacts: Vec<PeerContact>, cluster_size: usize) -> Result<()> {
        let mut engine = self.engine.lock()?;
        engine.apply_topology_update(contacts, cluster_size);
        info!(
            "[Node<{}>] Topology updated: {} neighbors, cluster size {}",
            self.node_id,
            engine.topology().neighbor_count(),
            engine.topology().cluster_size()
        );
        Ok(())
    }

    /// Drop proposals that have outlived the configured timeout.
    pub fn sweep_expired(&self) -> Result<usize> {
        let mut engine = self.engine.lock()?;
        Ok(engine.sweep_expired())
    }

    pub fn committed_snapshot(&self) -> Result<HashMap<String, Value>> {
        let engine = self.engine.lock()?;
        Ok(engine.committed_snapshot())
    }

    pub fn peers(&self) -> Result<Vec<PeerContact>> {
        let engine = self.engine.lock()?;
        Ok(engine.topology().contacts().to_vec())
    }

    pub fn status(&self) -> Result<NodeStatus> {
        let engine = self.engine.lock()?;
        Ok(NodeStatus {
            node_id: self.node_id.clone(),
            cluster_size: engine.topology().cluster_size(),
            quorum: engine.quorum(),
            neighbor_count: engine.topology().neighbor_count(),
            pending_proposals: engine.pending_proposals(),
            committed_entries: engine.committed_count(),
        })
    }

    /// Pump inbound datagrams from the transport channel into the engine.
    pub fn spawn_receive_loop(
        self: &Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>,
    ) -> tokio::task::JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            while let Some((data, source)) = rx.recv().await {
                if let Err(e) = node.handle_datagram(&data, source).await {
                    warn!("[Node<{}>] Failed handling datagram: {}", node.node_id, e);
                }
            }
            debug!("[Node<{}>] Receive loop finished", node.node_id);
        })
    }

    /// Periodically drop expired proposals.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match node.sweep_expired() {
                    Ok(0) => {}
                    Ok(swept) => info!("[Node<{}>] Swept {} expired proposals", node.node_id, swept),
                    Err(e) => warn!("[Node<{}>] Sweep failed: {}", node.node_id, e),
                }
            }
        })
    }

    async fn dispatch(&self, sends: Vec<(SocketAddr, Vec<u8>)>) {
        for (target, data) in sends {
            // Send failures are logged by the transport; flood re-propagation
            // covers any individual loss.
            let _ = self.sender.send(target, &data).await;
        }
    }
}

impl std::fmt::Debug for ConsensusNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusNode")
            .field("node_id", &self.node_id)
            .finish()
    }
}

/// Identify the immediate sender of a datagram.
///
/// Prefer a reverse lookup of the source address in the topology; fall back
/// to the message's `from` field for peers we do not track as neighbors.
fn resolve_sender(engine: &ConsensusEngine, source: SocketAddr, message: &WireMessage) -> NodeId {
    for contact in engine.topology().contacts() {
        if contact.addr == source {
            return contact.node_id.clone();
        }
    }
    match message {
        WireMessage::Propose { from, .. }
        | WireMessage::Vote { from, .. }
        | WireMessage::Commit { from, .. } => from.clone(),
        WireMessage::Topology { .. } => NodeId::new(source.to_string()),
    }
}

/// Turn a dissemination plan into concrete (address, payload) pairs.
///
/// `reply_addr` covers votes to a proposer that is not in our neighbor set;
/// the datagram source address is always a valid return path.
fn resolve_plan(
    engine: &ConsensusEngine,
    plan: Vec<Outbound>,
    reply_addr: Option<SocketAddr>,
) -> Result<Vec<(SocketAddr, Vec<u8>)>> {
    let topology = engine.topology();
    let mut sends = Vec::new();

    for outbound in plan {
        let data = outbound.message.to_bytes()?;
        match outbound.to {
            Recipient::Peer(ref peer) => match topology.addr_of(peer).or(reply_addr) {
                Some(addr) => sends.push((addr, data)),
                None => warn!("No known address for peer {}, dropping message", peer),
            },
            Recipient::AllNeighbors => {
                for contact in topology.contacts() {
                    sends.push((contact.addr, data.clone()));
                }
            }
            Recipient::AllNeighborsExcept(ref excluded) => {
                for contact in topology.contacts() {
                    if contact.node_id != *excluded {
                        sends.push((contact.addr, data.clone()));
                    }
                }
            }
        }
    }
    Ok(sends)
}
