//! Bridge timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 8_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Deadline applied around every tab delivery. Unset means the adapter's own polling
    /// budget is the only limit.
    pub channel_timeout_ms: Option<u64>,
    /// Deadline for a window-message round trip to an embedded frame.
    pub frame_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_timeout_ms: None,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    pub fn channel_timeout(&self) -> Option<Duration> {
        self.channel_timeout_ms.map(Duration::from_millis)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}
