use std::time::Duration;

use bridgelink::{CadenceConfig, SessionConfig};

#[derive(Debug, Clone)]
pub struct PrimaryConfig {
    /// Comma separated secondaries, `host` or `host:port`.
    pub peers: String,
    pub session: SessionConfig,
    pub cadence: CadenceConfig,
    pub tick_rate: u32,
    pub stats_interval: Duration,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            peers: String::new(),
            session: SessionConfig::default(),
            cadence: CadenceConfig::default(),
            tick_rate: 30,
            stats_interval: Duration::from_secs(10),
        }
    }
}
