//! In-process cluster scenarios.
//!
//! Several engines wired together through a shared message queue standing in
//! for the transport. Messages addressed to nodes without an engine are
//! dropped, like any lossy network.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use cluster_membership::{
    Clock, GossipConfig, GossipEngine, GossipMessage, ManualClock, MessageType, NodeAddr, NodeId,
    NodeStatus, NodeView,
};

type Outbox = Rc<RefCell<VecDeque<(NodeId, GossipMessage)>>>;
/// (observing engine, subject node, old status, new status)
type EventLog = Rc<RefCell<Vec<(NodeId, NodeId, NodeStatus, NodeStatus)>>>;

fn id(tail: u8) -> NodeId {
    let mut bytes = [0u8; 16];
    bytes[15] = tail;
    NodeId::from_bytes(bytes)
}

fn seed_view(tail: u8) -> NodeView {
    NodeView::new(id(tail), NodeAddr::new("127.0.0.1", 8000 + tail as u16))
}

struct Cluster {
    engines: Vec<(NodeId, GossipEngine)>,
    outbox: Outbox,
    events: EventLog,
    clock: ManualClock,
}

impl Cluster {
    fn new(tails: &[u8]) -> Self {
        let outbox: Outbox = Rc::new(RefCell::new(VecDeque::new()));
        let events: EventLog = Rc::new(RefCell::new(Vec::new()));
        let clock = ManualClock::new();

        let mut engines = Vec::new();
        for (index, &tail) in tails.iter().enumerate() {
            let engine = GossipEngine::builder(seed_view(tail))
                .config(GossipConfig {
                    rng_seed: Some(1000 + index as u64),
                    ..GossipConfig::default()
                })
                .clock(clock.clone())
                .on_send({
                    let outbox = outbox.clone();
                    move |msg, target| outbox.borrow_mut().push_back((target.id, msg.clone()))
                })
                .on_event({
                    let events = events.clone();
                    let observer = id(tail);
                    move |node, old| {
                        events.borrow_mut().push((observer, node.id, old, node.status))
                    }
                })
                .build()
                .expect("engine construction failed");
            engines.push((id(tail), engine));
        }

        Self {
            engines,
            outbox,
            events,
            clock,
        }
    }

    fn engine(&self, tail: u8) -> &GossipEngine {
        let target = id(tail);
        &self
            .engines
            .iter()
            .find(|(engine_id, _)| *engine_id == target)
            .expect("unknown engine")
            .1
    }

    fn engine_mut(&mut self, tail: u8) -> &mut GossipEngine {
        let target = id(tail);
        &mut self
            .engines
            .iter_mut()
            .find(|(engine_id, _)| *engine_id == target)
            .expect("unknown engine")
            .1
    }

    /// Delivers queued messages until the network is quiet.
    fn pump(&mut self) {
        let mut budget = 10_000;
        loop {
            let next = self.outbox.borrow_mut().pop_front();
            let Some((target, msg)) = next else { break };
            budget -= 1;
            assert!(budget > 0, "message storm: the exchange never quiesced");

            let now = self.clock.now();
            if let Some((_, engine)) = self
                .engines
                .iter_mut()
                .find(|(engine_id, _)| *engine_id == target)
            {
                engine.handle_message(&msg, now);
            }
        }
    }

    /// One gossip round: every engine ticks, then all traffic is delivered.
    fn round(&mut self) {
        for index in 0..self.engines.len() {
            self.engines[index].1.tick();
        }
        self.pump();
    }

    fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }
}

#[test]
fn two_node_meet_handshake() {
    let mut cluster = Cluster::new(&[1, 2]);

    cluster.engine_mut(1).meet(&seed_view(2));
    cluster.pump();

    // Both sides converge on Online views of each other.
    assert_eq!(
        cluster.engine(1).find_node(&id(2)).unwrap().status,
        NodeStatus::Online
    );
    assert_eq!(
        cluster.engine(2).find_node(&id(1)).unwrap().status,
        NodeStatus::Online
    );

    // One event per transition, on each side: absent -> joining -> online.
    assert_eq!(
        cluster.events.borrow().as_slice(),
        &[
            (id(1), id(2), NodeStatus::Unknown, NodeStatus::Joining),
            (id(2), id(1), NodeStatus::Unknown, NodeStatus::Joining),
            (id(2), id(1), NodeStatus::Joining, NodeStatus::Online),
            (id(1), id(2), NodeStatus::Joining, NodeStatus::Online),
        ]
    );
}

#[test]
fn piggyback_spreads_peers_through_replies() {
    let mut cluster = Cluster::new(&[1, 2]);

    // A and B introduce themselves to each other.
    cluster.engine_mut(1).meet(&seed_view(2));
    cluster.pump();

    // B alone knows about three more nodes (which are not running here, so
    // the introductions B sends them evaporate in the transport).
    for tail in [3, 4, 5] {
        cluster.engine_mut(2).meet(&seed_view(tail));
    }
    cluster.pump();
    assert_eq!(cluster.engine(1).node_count(), 1);
    assert_eq!(cluster.engine(2).node_count(), 4);

    // One tick of A: A pings B, and B's reply piggybacks two of its peers.
    cluster.engine_mut(1).tick();
    cluster.pump();

    let known: Vec<NodeId> = cluster
        .engine(1)
        .nodes()
        .iter()
        .map(|node| node.id)
        .collect();
    assert_eq!(known.len(), 3, "A should learn exactly piggyback_size peers");
    assert!(known.contains(&id(2)));
    for node_id in known {
        assert!([2, 3, 4, 5].map(id).contains(&node_id));
    }
}

#[test]
fn five_nodes_converge_to_full_mesh() {
    let mut cluster = Cluster::new(&[1, 2, 3, 4, 5]);

    // Everyone bootstraps off node 1.
    for tail in [2, 3, 4, 5] {
        cluster.engine_mut(tail).meet(&seed_view(1));
    }
    cluster.pump();

    for _ in 0..25 {
        cluster.round();
    }

    for tail in [1, 2, 3, 4, 5] {
        let engine = cluster.engine(tail);
        assert_eq!(
            engine.node_count(),
            4,
            "node {tail} does not know the whole cluster"
        );
        for peer in engine.nodes() {
            assert_eq!(
                peer.status,
                NodeStatus::Online,
                "node {tail} still sees {} as {}",
                peer.id,
                peer.status
            );
        }
    }
}

#[test]
fn graceful_leave_fails_the_leaver_everywhere_else() {
    let mut cluster = Cluster::new(&[1, 2, 3]);

    for tail in [2, 3] {
        cluster.engine_mut(tail).meet(&seed_view(1));
    }
    cluster.pump();
    for _ in 0..10 {
        cluster.round();
    }
    cluster.clear_events();

    let leaver = id(1);
    cluster.engine_mut(1).leave(&leaver);
    cluster.pump();

    // Every other engine marks the leaver failed and fires one event for it.
    for tail in [2, 3] {
        assert_eq!(
            cluster.engine(tail).find_node(&leaver).unwrap().status,
            NodeStatus::Failed
        );
    }
    let events = cluster.events.borrow();
    assert!(events.contains(&(id(2), leaver, NodeStatus::Online, NodeStatus::Failed)));
    assert!(events.contains(&(id(3), leaver, NodeStatus::Online, NodeStatus::Failed)));

    // The leaver's own state is untouched; only the peer-side views changed.
    assert_eq!(cluster.engine(1).self_view().status, NodeStatus::Online);
    assert_eq!(cluster.engine(1).node_count(), 2);
}

#[test]
fn stale_views_lose_against_the_resident_clock() {
    let mut cluster = Cluster::new(&[1, 2]);

    cluster.engine_mut(1).meet(&seed_view(2));
    cluster.pump();

    // A third node's state arrives newest-first; the stale copy must lose.
    let mut fresh = seed_view(3);
    fresh.status = NodeStatus::Online;
    fresh.config_epoch = 1;
    fresh.heartbeat = 5;
    let mut stale = fresh.clone();
    stale.heartbeat = 3;
    stale.status = NodeStatus::Suspect;

    for entry in [fresh, stale] {
        let update = GossipMessage {
            sender: id(2),
            kind: MessageType::Update,
            timestamp: 1,
            entries: vec![entry],
        };
        let now = cluster.clock.now();
        cluster.engine_mut(1).handle_message(&update, now);
    }

    let stored = cluster.engine(1).find_node(&id(3)).unwrap();
    assert_eq!(stored.heartbeat, 5);
    assert_eq!(stored.status, NodeStatus::Online);
}
