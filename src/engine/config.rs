use std::time::Duration;

/// Tunables of the gossip engine.
///
/// All periods are interpreted against the timestamps the driver passes in;
/// the engine itself never sleeps.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// How often the driver is expected to call `tick`. Advisory only; the
    /// engine does not schedule anything itself.
    pub heartbeat_interval: Duration,
    /// Silence before an `Online` peer becomes `Suspect`, and the gap between
    /// consecutive suspicion bumps after that.
    pub failure_timeout: Duration,
    /// Number of random peers probed per tick.
    pub gossip_fanout: usize,
    /// Extra node views attached to every probe and reply.
    pub piggyback_size: usize,
    /// Suspicion bumps a peer must exceed before it is declared `Failed`.
    pub suspicion_threshold: u32,
    /// Seed for the per-engine sampling RNG. `None` seeds from entropy;
    /// setting it makes peer selection reproducible under test.
    pub rng_seed: Option<u64>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(100),
            failure_timeout: Duration::from_millis(2000),
            gossip_fanout: 3,
            piggyback_size: 2,
            suspicion_threshold: 3,
            rng_seed: None,
        }
    }
}
