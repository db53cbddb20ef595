use std::time::Duration;

use bridgelink::ListenerConfig;

#[derive(Debug, Clone)]
pub struct SecondaryConfig {
    pub listener: ListenerConfig,
    pub poll_timeout: Duration,
    pub stats_interval: Duration,
    /// Commands forwarded to the primary once it connects, without the `MC` prefix.
    pub commands: Vec<String>,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            poll_timeout: Duration::from_millis(10),
            stats_interval: Duration::from_secs(10),
            commands: Vec::new(),
        }
    }
}
