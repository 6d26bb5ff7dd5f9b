use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Unique identifier for a node in the cluster.
/// A fixed 16-byte opaque value (e.g. a UUID); equality is byte-equality.
/// The engine never generates identifiers for itself; callers supply them.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 16]);

impl NodeId {
    /// Generates a random identifier (UUID v4). Convenience for callers;
    /// the engine itself never calls this.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for NodeId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<uuid::Uuid> for NodeId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.into_bytes())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

/// Represents the lifecycle state of a peer from the perspective of the local engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    /// Placeholder for state that has not been classified yet. Never observable
    /// through the public API: the table rewrites it to `Joining` on insert.
    Unknown,
    /// The node has been introduced but has not answered a probe yet.
    Joining,
    /// The node is healthy and responsive.
    Online,
    /// The node has missed the silence window and is suspected to be down.
    /// It returns to `Online` if it shows proof of life, or drops to `Failed`
    /// once the suspicion count passes the threshold.
    Suspect,
    /// The node is confirmed failed. Terminal until a superseding view of the
    /// same node arrives.
    Failed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Joining => write!(f, "joining"),
            Self::Online => write!(f, "online"),
            Self::Suspect => write!(f, "suspect"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Network location of a node. Free-form; only the transport collaborator
/// interprets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The engine's knowledge of one peer.
///
/// Two views of the same node are ordered by the composite logical clock
/// `(config_epoch, heartbeat)`: configuration changes (rare, authoritative,
/// epoch-bumped by the node itself) always dominate routine heartbeat
/// progress, and heartbeat breaks ties inside a single epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeView {
    /// Unique ID of the node.
    pub id: NodeId,
    /// Where the transport can reach the node.
    pub addr: NodeAddr,
    /// Configuration version. Externally incremented when the node's
    /// configuration changes (e.g. role promotion). Dominant clock axis.
    pub config_epoch: u64,
    /// Logical heartbeat, incremented by the node on each of its own ticks.
    /// Secondary clock axis.
    pub heartbeat: u64,
    /// Incremented on every local mutation. Advisory only; never consulted
    /// for protocol decisions.
    pub version: u64,
    /// Current health state.
    pub status: NodeStatus,
    /// Business role, e.g. "master" or "replica".
    pub role: String,
    /// Placement region, e.g. "us-east-1".
    pub region: String,
    /// Free-form key/value pairs propagated with the view.
    pub metadata: BTreeMap<String, String>,

    /// Local timestamp of the last successful interaction with this node.
    /// Not serialized; used only by the local failure detector.
    #[serde(skip)]
    pub seen_time: Option<Instant>,
    /// How many suspicion windows have elapsed without proof of life.
    /// Reset to zero whenever the node is heard from. Local only.
    #[serde(skip)]
    pub suspicion_count: u32,
    /// Local timestamp of the most recent suspicion bump. Not serialized.
    #[serde(skip)]
    pub last_suspected: Option<Instant>,
}

impl NodeView {
    /// Creates a blank view for the given identity and address. Status starts
    /// at `Unknown` and both clock axes at zero.
    pub fn new(id: NodeId, addr: NodeAddr) -> Self {
        Self {
            id,
            addr,
            config_epoch: 0,
            heartbeat: 0,
            version: 0,
            status: NodeStatus::Unknown,
            role: String::new(),
            region: String::new(),
            metadata: BTreeMap::new(),
            seen_time: None,
            suspicion_count: 0,
            last_suspected: None,
        }
    }

    /// Whether this view supersedes `other` under the composite logical clock:
    /// strictly greater `(config_epoch, heartbeat)`, compared lexicographically.
    /// Equal pairs yield no update.
    pub fn supersedes(&self, other: &NodeView) -> bool {
        (self.config_epoch, self.heartbeat) > (other.config_epoch, other.heartbeat)
    }
}
