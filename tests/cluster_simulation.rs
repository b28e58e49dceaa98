//! In-process cluster simulation
//!
//! Drives several consensus engines through the dissemination planner with a
//! message-passing harness instead of sockets. The harness can drop links,
//! duplicate deliveries and shuffle ordering, which is exactly the abuse the
//! protocol claims to absorb.

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use kvora::consensus::{
    AcceptancePolicy, ConsensusEngine, EngineConfig, NodeId, PeerContact, Vote,
};
use kvora::gossip::{handle_message, plan_local_propose, Outbound, Recipient, WireMessage};

/// Rejects proposals for one specific key, accepts everything else.
struct RejectKey(String);

impl AcceptancePolicy for RejectKey {
    fn decide(&self, key: &str, _value: &Value) -> Vote {
        if key == self.0 {
            Vote::Reject
        } else {
            Vote::Accept
        }
    }
}

/// One in-flight message: (sender, destination, payload).
type Envelope = (NodeId, NodeId, WireMessage);

struct SimCluster {
    nodes: BTreeMap<NodeId, ConsensusEngine>,
    queue: VecDeque<Envelope>,
    /// Directed links that silently drop messages.
    blocked: HashSet<(NodeId, NodeId)>,
}

impl SimCluster {
    fn new(names: &[&str]) -> Self {
        Self::with_engines(
            names
                .iter()
                .map(|name| {
                    ConsensusEngine::new(NodeId::from(*name), EngineConfig::default())
                })
                .collect(),
        )
    }

    fn with_engines(engines: Vec<ConsensusEngine>) -> Self {
        let contacts: Vec<PeerContact> = engines
            .iter()
            .enumerate()
            .map(|(i, e)| PeerContact {
                node_id: e.node_id().clone(),
                addr: format!("127.0.0.1:{}", 9000 + i as u16).parse().unwrap(),
            })
            .collect();
        let cluster_size = engines.len();

        let mut nodes = BTreeMap::new();
        for mut engine in engines {
            engine.apply_topology_update(contacts.clone(), cluster_size);
            nodes.insert(engine.node_id().clone(), engine);
        }
        Self {
            nodes,
            queue: VecDeque::new(),
            blocked: HashSet::new(),
        }
    }

    fn block(&mut self, from: &str, to: &str) {
        self.blocked.insert((NodeId::from(from), NodeId::from(to)));
    }

    fn engine(&self, name: &str) -> &ConsensusEngine {
        &self.nodes[&NodeId::from(name)]
    }

    /// Start a proposal at `origin` and queue its fan-out.
    fn propose(&mut self, origin: &str, key: &str, value: Value) -> Option<String> {
        let origin = NodeId::from(origin);
        let engine = self.nodes.get_mut(&origin).unwrap();
        let (proposal_id, plan) = plan_local_propose(engine, key.to_string(), value);
        self.enqueue(&origin, plan);
        proposal_id
    }

    fn enqueue(&mut self, sender: &NodeId, plan: Vec<Outbound>) {
        let neighbors: Vec<NodeId> = self.nodes[sender]
            .topology()
            .neighbor_ids()
            .cloned()
            .collect();

        for outbound in plan {
            let destinations: Vec<NodeId> = match &outbound.to {
                Recipient::Peer(peer) => vec![peer.clone()],
                Recipient::AllNeighbors => neighbors.clone(),
                Recipient::AllNeighborsExcept(excluded) => neighbors
                    .iter()
                    .filter(|n| *n != excluded)
                    .cloned()
                    .collect(),
            };
            for dest in destinations {
                self.queue
                    .push_back((sender.clone(), dest, outbound.message.clone()));
            }
        }
    }

    /// Deliver queued messages until quiescence, in FIFO order.
    fn run(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(envelope) = self.queue.pop_front() {
            self.deliver(envelope);
            delivered += 1;
            assert!(delivered < 100_000, "dissemination did not quiesce");
        }
        delivered
    }

    /// Deliver until quiescence with adversarial scheduling: random order,
    /// and each message has a chance of being delivered twice.
    fn run_chaotic<R: Rng>(&mut self, rng: &mut R, duplicate_chance: f64) -> usize {
        let mut delivered = 0;
        while !self.queue.is_empty() {
            let mut batch: Vec<Envelope> = self.queue.drain(..).collect();
            batch.shuffle(rng);
            for envelope in batch {
                if rng.gen_bool(duplicate_chance) {
                    self.deliver(envelope.clone());
                    delivered += 1;
                }
                self.deliver(envelope);
                delivered += 1;
                assert!(delivered < 100_000, "dissemination did not quiesce");
            }
        }
        delivered
    }

    fn deliver(&mut self, (sender, dest, message): Envelope) {
        if self.blocked.contains(&(sender.clone(), dest.clone())) {
            return;
        }
        let engine = self.nodes.get_mut(&dest).unwrap();
        let plan = handle_message(engine, &sender, message);
        self.enqueue(&dest, plan);
    }

    fn committed_everywhere(&self, key: &str) -> Option<Value> {
        let mut result = None;
        for engine in self.nodes.values() {
            let snapshot = engine.committed_snapshot();
            let value = snapshot.get(key)?;
            match &result {
                None => result = Some(value.clone()),
                Some(seen) => assert_eq!(seen, value, "nodes disagree on {}", key),
            }
        }
        result
    }

    fn no_pending_anywhere(&self) -> bool {
        self.nodes.values().all(|e| e.pending_proposals() == 0)
    }
}

#[test]
fn test_three_node_cluster_commits() {
    let mut cluster = SimCluster::new(&["a", "b", "c"]);

    let proposal_id = cluster.propose("a", "color", json!("green"));
    assert!(proposal_id.is_some());
    cluster.run();

    assert_eq!(cluster.committed_everywhere("color"), Some(json!("green")));
    assert!(cluster.no_pending_anywhere());
}

#[test]
fn test_five_node_cluster_with_one_rejector() {
    let mut engines: Vec<ConsensusEngine> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| ConsensusEngine::new(NodeId::from(*n), EngineConfig::default()))
        .collect();
    engines.push(ConsensusEngine::with_policy(
        NodeId::from("e"),
        EngineConfig::default(),
        Box::new(RejectKey("color".into())),
    ));
    let mut cluster = SimCluster::with_engines(engines);

    // threshold(5) = 4: four accepts (including the proposer) still commit
    cluster.propose("a", "color", json!("green"));
    cluster.run();

    // The rejector learns the outcome through COMMIT despite voting reject
    assert_eq!(cluster.committed_everywhere("color"), Some(json!("green")));
}

#[test]
fn test_proposal_stalls_below_quorum_and_expires() {
    // Zero timeout so the sweep below fires without waiting
    let expiring = EngineConfig {
        proposal_timeout: std::time::Duration::ZERO,
        ..EngineConfig::default()
    };
    let mut engines = vec![ConsensusEngine::new(NodeId::from("a"), expiring.clone())];
    for n in ["b", "c"] {
        engines.push(ConsensusEngine::with_policy(
            NodeId::from(n),
            expiring.clone(),
            Box::new(RejectKey("color".into())),
        ));
    }
    let mut cluster = SimCluster::with_engines(engines);

    cluster.propose("a", "color", json!("green"));
    cluster.run();

    // 1 accept (self) vs threshold(3) = 2: nothing commits
    assert!(cluster.committed_everywhere("color").is_none());
    assert!(!cluster.no_pending_anywhere());

    // The sweeper clears the stalled entries; committed state is untouched
    std::thread::sleep(std::time::Duration::from_millis(5));
    for engine in cluster.nodes.values_mut() {
        engine.sweep_expired();
    }
    assert!(cluster.no_pending_anywhere());
    assert!(cluster.committed_everywhere("color").is_none());

    // The key is proposable again after expiry
    let retried = cluster.nodes.get_mut(&NodeId::from("a")).unwrap();
    assert!(retried.create_proposal("color".into(), json!("blue")).is_some());
}

#[test]
fn test_commit_reflood_heals_missed_deliveries() {
    let mut cluster = SimCluster::new(&["a", "b", "c"]);
    // c never hears a directly; it can only learn via b's re-floods
    cluster.block("a", "c");

    cluster.propose("a", "color", json!("green"));
    cluster.run();

    assert_eq!(cluster.committed_everywhere("color"), Some(json!("green")));
    assert!(cluster.no_pending_anywhere());
}

#[test]
fn test_chaotic_delivery_converges() {
    let mut rng = rand::thread_rng();

    for round in 0..10 {
        let mut cluster = SimCluster::new(&["a", "b", "c", "d", "e"]);
        let key = format!("key-{}", round);
        cluster.propose("a", &key, json!(round));
        cluster.run_chaotic(&mut rng, 0.3);

        assert_eq!(cluster.committed_everywhere(&key), Some(json!(round)));
        assert!(cluster.no_pending_anywhere());
    }
}

#[test]
fn test_concurrent_proposals_for_distinct_keys() {
    let mut cluster = SimCluster::new(&["a", "b", "c"]);

    cluster.propose("a", "x", json!(1));
    cluster.propose("b", "y", json!(2));
    cluster.propose("c", "z", json!(3));
    cluster.run();

    assert_eq!(cluster.committed_everywhere("x"), Some(json!(1)));
    assert_eq!(cluster.committed_everywhere("y"), Some(json!(2)));
    assert_eq!(cluster.committed_everywhere("z"), Some(json!(3)));
    assert!(cluster.no_pending_anywhere());
}

#[test]
fn test_concurrent_proposals_for_same_key_stay_monotonic_per_node() {
    let mut rng = rand::thread_rng();
    let mut cluster = SimCluster::new(&["a", "b", "c", "d", "e"]);

    cluster.propose("a", "winner", json!("from-a"));
    cluster.propose("b", "winner", json!("from-b"));
    cluster.run_chaotic(&mut rng, 0.3);

    // Same-key races have no cluster-wide arbiter: both proposers may reach
    // quorum before either COMMIT lands. The guarantee is per-node: every
    // node commits exactly one of the competing values and keeps it.
    let first: BTreeMap<NodeId, Value> = cluster
        .nodes
        .iter()
        .map(|(id, engine)| {
            let value = engine
                .committed_snapshot()
                .get("winner")
                .cloned()
                .expect("every node commits some value");
            assert!(value == json!("from-a") || value == json!("from-b"));
            (id.clone(), value)
        })
        .collect();

    // Replaying both COMMITs at every node changes nothing
    let relayer = NodeId::from("a");
    let destinations: Vec<NodeId> = cluster.nodes.keys().cloned().collect();
    for dest in destinations {
        for value in [json!("from-a"), json!("from-b")] {
            cluster.queue.push_back((
                relayer.clone(),
                dest.clone(),
                WireMessage::Commit {
                    proposal_id: "replay".into(),
                    key: "winner".into(),
                    value,
                    from: relayer.clone(),
                },
            ));
        }
    }
    cluster.run();

    for (id, engine) in &cluster.nodes {
        assert_eq!(engine.committed_snapshot()["winner"], first[id]);
    }
    assert!(cluster.no_pending_anywhere());
}

#[test]
fn test_value_only_broadcast_variant() {
    let mut cluster = SimCluster::new(&["a", "b", "c"]);

    let proposal_id = {
        let origin = NodeId::from("a");
        let engine = cluster.nodes.get_mut(&origin).unwrap();
        let value = json!(42);
        let key = kvora::consensus::value_key(&value);
        let (proposal_id, plan) = plan_local_propose(engine, key, value);
        cluster.enqueue(&origin, plan);
        proposal_id
    };
    assert!(proposal_id.is_some());
    cluster.run();

    assert_eq!(cluster.committed_everywhere("42"), Some(json!(42)));
}
