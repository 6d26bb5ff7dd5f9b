//! Gossip Engine Facade
//!
//! The tick-driven state machine that turns the membership table into a live
//! protocol participant. The host owns the schedule and the I/O:
//!
//! - **Ticks**: a clock driver calls [`service::GossipEngine::tick`] periodically.
//!   Each tick probes a bounded random subset of peers, piggybacks a small sample
//!   of known state on every probe, advances the local heartbeat, and runs the
//!   suspicion-based failure detector.
//! - **Messages**: the transport hands every received message to
//!   [`service::GossipEngine::handle_message`] together with its receipt time.
//!   Merging is monotone in `(config_epoch, heartbeat)`, so out-of-order and
//!   duplicated delivery are harmless.
//! - **Hooks**: outgoing messages and status-change events flow through two
//!   caller-supplied closures, invoked synchronously on the driver thread.
//!   Nothing in the engine blocks, retries, or spawns.

pub mod clock;
pub mod config;
pub mod service;
