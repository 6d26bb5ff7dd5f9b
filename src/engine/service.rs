use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, MonotonicClock};
use super::config::GossipConfig;
use crate::membership::table::{MembershipTable, MergeOutcome};
use crate::membership::types::{NodeId, NodeStatus, NodeView};
use crate::protocol::types::{GossipMessage, MessageType};

/// Send hook: the engine hands the transport a message and the view of the
/// node it should go to. Called synchronously; delivery failures are silent
/// and the engine never retries (the next tick re-establishes contact).
pub type SendFn = Box<dyn FnMut(&GossipMessage, &NodeView)>;

/// Event hook: called synchronously whenever a node's status changes, with the
/// node's current view and its previous status. Must not re-enter the engine.
pub type EventFn = Box<dyn FnMut(&NodeView, NodeStatus)>;

/// Why an engine could not be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A send hook is mandatory; without one the engine cannot gossip at all.
    #[error("send hook is required")]
    MissingSendHook,
}

/// Monotonic counters describing one engine's activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GossipStats {
    pub known_nodes: usize,
    pub sent_messages: u64,
    pub received_messages: u64,
    /// Wall-free duration of the most recent `tick`.
    pub last_tick_duration: Duration,
}

/// Configures and constructs a [`GossipEngine`].
pub struct GossipEngineBuilder {
    self_view: NodeView,
    config: GossipConfig,
    send_fn: Option<SendFn>,
    event_fn: Option<EventFn>,
    clock: Box<dyn Clock>,
}

impl GossipEngineBuilder {
    pub fn config(mut self, config: GossipConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs the send hook. Required.
    pub fn on_send(mut self, send_fn: impl FnMut(&GossipMessage, &NodeView) + 'static) -> Self {
        self.send_fn = Some(Box::new(send_fn));
        self
    }

    /// Installs the status-change observer. Optional.
    pub fn on_event(mut self, event_fn: impl FnMut(&NodeView, NodeStatus) + 'static) -> Self {
        self.event_fn = Some(Box::new(event_fn));
        self
    }

    /// Replaces the time source. Defaults to [`MonotonicClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn build(self) -> Result<GossipEngine, BuildError> {
        let send_fn = self.send_fn.ok_or(BuildError::MissingSendHook)?;
        let rng = match self.config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut self_view = self.self_view;
        self_view.status = NodeStatus::Online;
        self_view.seen_time = Some(self.clock.now());

        info!("Starting gossip engine as node {}", self_view.id);

        Ok(GossipEngine {
            self_view,
            table: MembershipTable::new(),
            config: self.config,
            send_fn,
            event_fn: self.event_fn,
            clock: self.clock,
            rng,
            sent_messages: 0,
            received_messages: 0,
            last_tick_duration: Duration::ZERO,
        })
    }
}

/// The protocol engine: one participant's membership state plus the tick-driven
/// probe/response machinery around it.
///
/// Single-threaded cooperative model: the driver calls `tick` on a schedule and
/// `handle_message` for every message the transport delivers, in strict
/// sequence. The engine holds no locks, performs no I/O, and invokes its hooks
/// synchronously on the driver's thread.
pub struct GossipEngine {
    self_view: NodeView,
    table: MembershipTable,
    config: GossipConfig,
    send_fn: SendFn,
    event_fn: Option<EventFn>,
    clock: Box<dyn Clock>,
    rng: StdRng,
    sent_messages: u64,
    received_messages: u64,
    last_tick_duration: Duration,
}

impl GossipEngine {
    /// Starts building an engine around the caller-supplied self view. The
    /// view's status is forced to `Online` at build time.
    pub fn builder(self_view: NodeView) -> GossipEngineBuilder {
        GossipEngineBuilder {
            self_view,
            config: GossipConfig::default(),
            send_fn: None,
            event_fn: None,
            clock: Box::new(MonotonicClock),
        }
    }

    // ---------------------------------------------------------
    // Tick path
    // ---------------------------------------------------------

    /// Drives one gossip cycle: probe a random subset of peers, advance the
    /// local heartbeat, then sweep the table for silent peers.
    pub fn tick(&mut self) {
        let start = self.clock.now();
        let targets = self
            .table
            .sample(self.config.gossip_fanout, None, &mut self.rng);
        self.run_tick(start, targets);
    }

    /// Like [`tick`](Self::tick), but probes every `Online` peer instead of a
    /// random subset. Used to disseminate a configuration change quickly.
    pub fn tick_full_broadcast(&mut self) {
        let start = self.clock.now();
        let targets: Vec<NodeView> = self
            .table
            .snapshot()
            .into_iter()
            .filter(|node| node.status == NodeStatus::Online)
            .collect();
        self.run_tick(start, targets);
    }

    fn run_tick(&mut self, start: Instant, targets: Vec<NodeView>) {
        self.self_view.seen_time = Some(start);

        for target in &targets {
            let probe = self.build_exchange(MessageType::Ping, Some(&target.id));
            debug!("Sending ping to {}", target.id);
            self.dispatch(&probe, target);
        }

        self.self_view.heartbeat += 1;
        self.self_view.version += 1;

        self.detect_failures(start);

        self.last_tick_duration = self.clock.now().saturating_duration_since(start);
    }

    /// Escalates silent peers: `Online` peers quiet for a full failure timeout
    /// become `Suspect`; suspects accrue one bump per further timeout window
    /// and drop to `Failed` once the count passes the threshold.
    fn detect_failures(&mut self, now: Instant) {
        let timeout = self.config.failure_timeout;
        let threshold = self.config.suspicion_threshold;
        let mut transitions: Vec<(NodeView, NodeStatus)> = Vec::new();

        for node in self.table.iter_mut() {
            match node.status {
                NodeStatus::Online => match node.seen_time {
                    Some(seen) if now.saturating_duration_since(seen) >= timeout => {
                        warn!(
                            "Node {} suspected (silent for {:?})",
                            node.id,
                            now.saturating_duration_since(seen)
                        );
                        node.status = NodeStatus::Suspect;
                        node.suspicion_count += 1;
                        node.last_suspected = Some(now);
                        transitions.push((node.clone(), NodeStatus::Online));
                    }
                    Some(_) => {}
                    // Never interacted with; start the silence window now.
                    None => node.seen_time = Some(now),
                },
                NodeStatus::Suspect => {
                    let window_elapsed = node
                        .last_suspected
                        .map_or(true, |at| now.saturating_duration_since(at) >= timeout);
                    if window_elapsed {
                        node.suspicion_count += 1;
                        node.last_suspected = Some(now);
                        if node.suspicion_count > threshold {
                            warn!(
                                "Node {} declared failed after {} suspicion windows",
                                node.id, node.suspicion_count
                            );
                            node.status = NodeStatus::Failed;
                            transitions.push((node.clone(), NodeStatus::Suspect));
                        }
                    }
                }
                _ => {}
            }
        }

        for (node, old_status) in transitions {
            self.notify(&node, old_status);
        }
    }

    // ---------------------------------------------------------
    // Message handling
    // ---------------------------------------------------------

    /// Applies one received message at `recv_time`.
    ///
    /// Unknown senders are tolerated only on `Meet`/`Join`, which may introduce
    /// themselves through their own entry; anything else from an unknown sender
    /// is dropped silently. Probes and introductions are answered with a `Pong`
    /// carrying the local self view plus a piggybacked sample.
    pub fn handle_message(&mut self, msg: &GossipMessage, recv_time: Instant) {
        self.received_messages += 1;

        let is_bootstrap = matches!(msg.kind, MessageType::Meet | MessageType::Join);
        let mut sender_known = self.table.find(&msg.sender).is_some();

        // A meet/join from an unknown sender introduces itself via its entries.
        // Like `introduce`, discovery always starts at `Joining`, even though a
        // live sender's self view says `Online`; the proof-of-life block below
        // promotes it.
        if !sender_known && is_bootstrap {
            if let Some(entry) = msg.entries.iter().find(|entry| entry.id == msg.sender) {
                if entry.id != self.self_view.id {
                    info!("Discovered new node {} via {:?}", entry.id, msg.kind);
                    let mut discovered = entry.clone();
                    discovered.status = NodeStatus::Joining;
                    let (outcome, resident) =
                        self.table.insert_or_merge(discovered, recv_time);
                    let snapshot = resident.clone();
                    self.emit_merge_outcome(outcome, snapshot);
                    sender_known = true;
                }
            }
        }

        if !sender_known && !is_bootstrap {
            debug!("Dropping {:?} from unknown sender {}", msg.kind, msg.sender);
            return;
        }

        // Proof of life from the sender: bump its clock, stamp it seen, clear
        // suspicion, and walk it through joining -> online or -> failed on leave.
        if sender_known {
            let mut events: Vec<(NodeView, NodeStatus)> = Vec::new();
            if let Some(sender) = self.table.find_mut(&msg.sender) {
                if msg.timestamp > sender.heartbeat {
                    sender.heartbeat = msg.timestamp;
                }
                sender.seen_time = Some(recv_time);
                sender.version += 1;

                if sender.status == NodeStatus::Suspect {
                    sender.suspicion_count = 0;
                }

                if sender.status == NodeStatus::Joining {
                    sender.status = NodeStatus::Online;
                    events.push((sender.clone(), NodeStatus::Joining));
                }

                if msg.kind == MessageType::Leave && sender.status != NodeStatus::Failed {
                    info!("Node {} left the cluster", sender.id);
                    let old_status = sender.status;
                    sender.status = NodeStatus::Failed;
                    events.push((sender.clone(), old_status));
                }
            }
            for (node, old_status) in events {
                self.notify(&node, old_status);
            }
        }

        // Absorb the piggybacked entries. Entries echoing our own identity are
        // skipped; the table must never hold the local node.
        for entry in &msg.entries {
            if entry.id == self.self_view.id {
                continue;
            }
            let (outcome, resident) = self.table.insert_or_merge(entry.clone(), recv_time);
            let snapshot = resident.clone();
            self.emit_merge_outcome(outcome, snapshot);
        }

        // Answer probes and introductions.
        if sender_known && matches!(msg.kind, MessageType::Ping | MessageType::Meet | MessageType::Join)
        {
            if let Some(target) = self.table.find(&msg.sender).cloned() {
                let pong = self.build_exchange(MessageType::Pong, Some(&target.id));
                debug!("Sending pong to {}", target.id);
                self.dispatch(&pong, &target);
            }
        }
    }

    // ---------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------

    /// Introduces a new peer: records it as `Joining` and sends it a `Meet`
    /// message carrying only the local self view. Self-referential calls are
    /// ignored.
    pub fn meet(&mut self, node: &NodeView) {
        self.introduce(node, MessageType::Meet);
    }

    /// Same as [`meet`](Self::meet) but sends a `Join`-typed message, hinting
    /// to the peer that the sender is new to the cluster.
    pub fn join(&mut self, node: &NodeView) {
        self.introduce(node, MessageType::Join);
    }

    fn introduce(&mut self, node: &NodeView, kind: MessageType) {
        if node.id == self.self_view.id {
            return;
        }

        if self.table.find(&node.id).is_none() {
            let now = self.clock.now();
            let mut view = node.clone();
            view.status = NodeStatus::Joining;
            info!("Node {} joining the cluster via {:?}", view.id, kind);
            let (outcome, resident) = self.table.insert_or_merge(view, now);
            let snapshot = resident.clone();
            self.emit_merge_outcome(outcome, snapshot);
        }

        let msg = GossipMessage {
            sender: self.self_view.id,
            kind,
            timestamp: self.self_view.heartbeat,
            entries: vec![self.self_view.clone()],
        };
        self.dispatch(&msg, node);
    }

    /// Announces a departure to every `Online` peer.
    ///
    /// Passing the local node's own id performs a graceful self-departure: the
    /// leave message carries the self view and local state is left untouched
    /// (only the peers' views of this node change). For any other known id the
    /// stored view is broadcast and the peer is marked `Failed` locally.
    pub fn leave(&mut self, id: &NodeId) {
        if *id == self.self_view.id {
            let msg = GossipMessage {
                sender: self.self_view.id,
                kind: MessageType::Leave,
                timestamp: self.self_view.heartbeat,
                entries: vec![self.self_view.clone()],
            };
            let targets: Vec<NodeView> = self
                .table
                .snapshot()
                .into_iter()
                .filter(|node| node.status == NodeStatus::Online)
                .collect();
            info!("Leaving the cluster, notifying {} peers", targets.len());
            for target in &targets {
                self.dispatch(&msg, target);
            }
            return;
        }

        let Some(leaving) = self.table.find(id).cloned() else {
            return;
        };

        let msg = GossipMessage {
            sender: self.self_view.id,
            kind: MessageType::Leave,
            timestamp: self.self_view.heartbeat,
            entries: vec![leaving.clone()],
        };
        let targets: Vec<NodeView> = self
            .table
            .snapshot()
            .into_iter()
            .filter(|node| node.status == NodeStatus::Online && node.id != *id)
            .collect();
        for target in &targets {
            self.dispatch(&msg, target);
        }

        if let Some(stored) = self.table.find_mut(id) {
            let old_status = stored.status;
            stored.status = NodeStatus::Failed;
            let snapshot = stored.clone();
            info!("Node {} removed from the active set", snapshot.id);
            self.notify(&snapshot, old_status);
        }
    }

    /// Prunes every peer that is not `Online` and has been silent for longer
    /// than `timeout`. No notifications are emitted.
    pub fn cleanup_expired(&mut self, timeout: Duration) {
        let now = self.clock.now();
        self.table.remove_where(|node| {
            node.status != NodeStatus::Online
                && node
                    .seen_time
                    .map_or(true, |seen| now.saturating_duration_since(seen) > timeout)
        });
    }

    /// Drops all peers and restarts the local clock axes: heartbeat back to 1,
    /// version to 0, counters cleared.
    pub fn reset(&mut self) {
        self.table.clear();
        self.self_view.heartbeat = 1;
        self.self_view.version = 0;
        self.self_view.seen_time = Some(self.clock.now());
        self.sent_messages = 0;
        self.received_messages = 0;
        self.last_tick_duration = Duration::ZERO;
    }

    // ---------------------------------------------------------
    // Read side
    // ---------------------------------------------------------

    pub fn self_view(&self) -> &NodeView {
        &self.self_view
    }

    /// Looks up a node by id, answering for the local node as well as peers.
    pub fn find_node(&self, id: &NodeId) -> Option<NodeView> {
        if *id == self.self_view.id {
            return Some(self.self_view.clone());
        }
        self.table.find(id).cloned()
    }

    /// Copies of all currently known peers (excluding the local node).
    pub fn nodes(&self) -> Vec<NodeView> {
        self.table.snapshot()
    }

    /// Number of known peers, excluding the local node.
    pub fn node_count(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> GossipStats {
        GossipStats {
            known_nodes: self.table.len(),
            sent_messages: self.sent_messages,
            received_messages: self.received_messages,
            last_tick_duration: self.last_tick_duration,
        }
    }

    // ---------------------------------------------------------
    // Internals
    // ---------------------------------------------------------

    /// Builds a probe or reply: the self view first, then up to
    /// `piggyback_size` extra views sampled from the table.
    fn build_exchange(&mut self, kind: MessageType, exclude: Option<&NodeId>) -> GossipMessage {
        let mut entries = Vec::with_capacity(1 + self.config.piggyback_size);
        entries.push(self.self_view.clone());
        entries.extend(
            self.table
                .sample(self.config.piggyback_size, exclude, &mut self.rng),
        );
        GossipMessage {
            sender: self.self_view.id,
            kind,
            timestamp: self.self_view.heartbeat,
            entries,
        }
    }

    fn dispatch(&mut self, msg: &GossipMessage, target: &NodeView) {
        (self.send_fn)(msg, target);
        self.sent_messages += 1;
    }

    fn emit_merge_outcome(&mut self, outcome: MergeOutcome, node: NodeView) {
        match outcome {
            MergeOutcome::Inserted => self.notify(&node, NodeStatus::Unknown),
            MergeOutcome::Replaced { old_status } => self.notify(&node, old_status),
            MergeOutcome::Ignored => {}
        }
    }

    fn notify(&mut self, node: &NodeView, old_status: NodeStatus) {
        if node.status == old_status {
            return;
        }
        info!(
            "Node {} transitioned {} -> {}",
            node.id, old_status, node.status
        );
        if let Some(event_fn) = self.event_fn.as_mut() {
            event_fn(node, old_status);
        }
    }
}
