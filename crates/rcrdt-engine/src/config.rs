//! Engine configuration.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Cluster role this engine belongs to; membership signals are filtered
    /// to this role.
    pub role: String,
    pub gossip_interval: Duration,
    pub max_delta_elements: usize,
    pub pruning_interval: Duration,
    /// Dissemination window, measured in reachability-clock ticks rather
    /// than wall time (the clock itself is a logical counter, see
    /// `rcrdt_cluster::Membership`).
    pub max_pruning_dissemination: u64,
}

impl EngineConfig {
    pub fn builder(role: impl Into<String>) -> EngineConfigBuilder {
        EngineConfigBuilder::new(role)
    }
}

pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            config: EngineConfig {
                role: role.into(),
                gossip_interval: Duration::from_secs(2),
                max_delta_elements: 1000,
                pruning_interval: Duration::from_secs(30),
                max_pruning_dissemination: 30,
            },
        }
    }

    pub fn gossip_interval(mut self, interval: Duration) -> Self {
        self.config.gossip_interval = interval;
        self
    }

    pub fn max_delta_elements(mut self, n: usize) -> Self {
        self.config.max_delta_elements = n;
        self
    }

    pub fn pruning_interval(mut self, interval: Duration) -> Self {
        self.config.pruning_interval = interval;
        self
    }

    pub fn max_pruning_dissemination(mut self, ticks: u64) -> Self {
        self.config.max_pruning_dissemination = ticks;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
