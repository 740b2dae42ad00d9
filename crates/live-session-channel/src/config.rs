//! Live channel configuration.

use leaguer_config_and_utils::{Config, CoreResult};
use std::time::Duration;
use url::Url;

/// Live channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Server base URL (e.g., ws://localhost:9000). http(s) is mapped to ws(s).
    pub ws_url: Url,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Delay before the first reconnect attempt.
    pub reconnect_base_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Reconnect attempts per outage before giving up.
    pub max_reconnect_attempts: u32,
}

impl ChannelConfig {
    pub fn new(ws_url: Url) -> Self {
        Self {
            ws_url,
            ping_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
        }
    }

    pub fn from_config(config: &Config) -> CoreResult<Self> {
        Ok(Self::new(config.ws_url()?))
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(
            self.reconnect_base_delay.saturating_mul(factor),
            self.reconnect_max_delay,
        )
    }
}
