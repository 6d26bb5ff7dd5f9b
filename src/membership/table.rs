use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use super::types::{NodeId, NodeStatus, NodeView};

/// What `insert_or_merge` did with an incoming view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The node was not known before; its view was inserted.
    Inserted,
    /// The incoming view superseded the resident one and replaced it wholesale.
    Replaced { old_status: NodeStatus },
    /// The incoming view did not supersede the resident one; nothing changed.
    Ignored,
}

/// The set of peer views known to one engine, keyed by identity.
///
/// The engine's own identity is never stored here; the facade filters
/// self-referencing entries before they reach the table.
#[derive(Debug, Default)]
pub struct MembershipTable {
    nodes: HashMap<NodeId, NodeView>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a previously unknown view, or merges it against the resident
    /// one under the `(config_epoch, heartbeat)` ordering.
    ///
    /// On insert or replace the resident view's `seen_time` is stamped with
    /// `seen_at` and an `Unknown` status is rewritten to `Joining`, so
    /// `Unknown` is never observable from outside. Returns what happened plus
    /// a reference to the resident view so the caller can emit events.
    pub fn insert_or_merge(
        &mut self,
        mut incoming: NodeView,
        seen_at: Instant,
    ) -> (MergeOutcome, &NodeView) {
        match self.nodes.entry(incoming.id) {
            Entry::Vacant(slot) => {
                incoming.seen_time = Some(seen_at);
                if incoming.status == NodeStatus::Unknown {
                    incoming.status = NodeStatus::Joining;
                }
                (MergeOutcome::Inserted, slot.insert(incoming))
            }
            Entry::Occupied(slot) => {
                let resident = slot.into_mut();
                if incoming.supersedes(resident) {
                    let old_status = resident.status;
                    *resident = incoming;
                    resident.seen_time = Some(seen_at);
                    if resident.status == NodeStatus::Unknown {
                        resident.status = NodeStatus::Joining;
                    }
                    (MergeOutcome::Replaced { old_status }, resident)
                } else {
                    (MergeOutcome::Ignored, resident)
                }
            }
        }
    }

    pub fn find(&self, id: &NodeId) -> Option<&NodeView> {
        self.nodes.get(id)
    }

    pub fn find_mut(&mut self, id: &NodeId) -> Option<&mut NodeView> {
        self.nodes.get_mut(id)
    }

    /// Copies of all known views. Iteration order is unspecified.
    pub fn snapshot(&self) -> Vec<NodeView> {
        self.nodes.values().cloned().collect()
    }

    /// Removes every view matching the predicate. No notifications.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&NodeView) -> bool) {
        self.nodes.retain(|_, view| !predicate(view));
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeView> {
        self.nodes.values_mut()
    }

    /// Uniformly samples up to `k` views, optionally excluding one identity.
    /// Returns fewer than `k` if fewer candidates exist; never biased by
    /// insertion order.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        k: usize,
        exclude: Option<&NodeId>,
        rng: &mut R,
    ) -> Vec<NodeView> {
        if k == 0 {
            return Vec::new();
        }
        self.nodes
            .values()
            .filter(|view| exclude.map_or(true, |id| view.id != *id))
            .cloned()
            .choose_multiple(rng, k)
    }
}
