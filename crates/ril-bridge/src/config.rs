//! Bridge configuration

use std::path::Path;
use std::time::Duration;

use ril_protocol::request;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BridgeError;

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Modem daemon socket
    pub socket_path: String,
    /// Service name used to stop/start the modem daemon
    pub daemon_name: String,
    /// Audio path re-check period while off-hook (ms)
    pub path_check_interval_ms: u64,
    /// Pause after restarting the daemon before reporting radio on (ms)
    pub restart_settle_ms: u64,
    /// Default vendor hang-up opcode
    pub hangup_opcode: i32,
    /// Capacity of the actor command and event channels
    pub channel_capacity: usize,
    /// Delay between socket reconnect attempts (ms)
    pub reconnect_delay_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            socket_path: "/dev/socket/rild".to_string(),
            daemon_name: "ril-daemon".to_string(),
            path_check_interval_ms: 2500,
            restart_settle_ms: 500,
            hangup_opcode: request::VENDOR_HANG_UP_CALL,
            channel_capacity: 256,
            reconnect_delay_ms: 1000,
        }
    }
}

impl BridgeConfig {
    /// Load from a JSON file, falling back to defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Audio path re-check period
    pub fn path_check_interval(&self) -> Duration {
        Duration::from_millis(self.path_check_interval_ms)
    }

    /// Settle delay after a daemon restart
    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    /// Reconnect back-off
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
