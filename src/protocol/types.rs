use serde::{Deserialize, Serialize};

use crate::membership::types::{NodeId, NodeView};

/// Wire-level tag of a gossip message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageType {
    /// Routine probe carrying the sender's view plus a piggybacked sample.
    Ping,
    /// Answer to `Ping`/`Meet`/`Join`, same piggyback policy.
    Pong,
    /// Introduction: the sender asks the target to start gossiping with it.
    Meet,
    /// Explicit join; like `Meet`, with the hint that the sender is new.
    Join,
    /// Graceful departure of the node carried in the single entry.
    Leave,
    /// Unsolicited state push, e.g. after a configuration change.
    Update,
}

/// One gossip exchange between two participants.
///
/// The serializer collaborator must preserve every field here, and for each
/// entry the identity, address, both clock axes, version, status, role,
/// region, and the full metadata map. Entry fields marked local-only on
/// [`NodeView`] never cross the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GossipMessage {
    /// Identity of the sending node.
    pub sender: NodeId,
    /// What kind of exchange this is.
    pub kind: MessageType,
    /// The sender's heartbeat at send time.
    pub timestamp: u64,
    /// Piggybacked node views, ordered. Bounded by the piggyback policy at
    /// construction time but unbounded on receive.
    pub entries: Vec<NodeView>,
}
