//! Wire Protocol Contract
//!
//! The message values exchanged between participants. The engine constructs and
//! consumes these; it never serializes them. Any codec that round-trips the
//! fields listed on [`types::GossipMessage`] is a conformant serializer, and the
//! local-only fields of a node view (`seen_time`, `suspicion_count`,
//! `last_suspected`) are deliberately skipped: they are the receiver's
//! prerogative, so a serializer that restored them would be non-conformant.

pub mod types;
