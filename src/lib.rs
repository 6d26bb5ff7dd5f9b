//! Embeddable Membership & Failure Detection Engine
//!
//! This library crate implements a SWIM-style gossip protocol core for decentralized
//! clusters. Each participant keeps an eventually-consistent view of cluster membership
//! by probing a few random peers per tick, piggybacking a bounded sample of known node
//! state on every probe, and escalating silent peers through suspicion before declaring
//! them failed.
//!
//! The engine is transport-agnostic: it never opens sockets, never blocks, and never
//! serializes bytes. The host drives it (calls `tick` on a schedule, feeds it received
//! messages) and supplies a send hook the engine uses to dispatch outgoing messages.
//!
//! ## Architecture Modules
//! The crate is composed of three loosely coupled subsystems:
//!
//! - **`membership`**: The data model and membership table. Node identity, per-peer
//!   views with a composite `(config_epoch, heartbeat)` logical clock, the merge rules
//!   that converge concurrently observed states, and uniform random peer sampling.
//! - **`protocol`**: The wire-message contract exchanged between participants. Message
//!   values carry the sender, a type tag, the sender's heartbeat, and piggybacked node
//!   views; serialization itself is left to the host.
//! - **`engine`**: The tick-driven facade. Probe dispatch, message handling, the
//!   suspicion-based failure detector, status-change events, configuration, and the
//!   monotonic clock abstraction that makes the detector testable.

pub mod engine;
pub mod membership;
pub mod protocol;

pub use engine::clock::{Clock, ManualClock, MonotonicClock};
pub use engine::config::GossipConfig;
pub use engine::service::{
    BuildError, EventFn, GossipEngine, GossipEngineBuilder, GossipStats, SendFn,
};
pub use membership::table::{MembershipTable, MergeOutcome};
pub use membership::types::{NodeAddr, NodeId, NodeStatus, NodeView};
pub use protocol::types::{GossipMessage, MessageType};
