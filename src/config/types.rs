use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::DEFAULT_SCAN_TIMEOUT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// The robot to connect to; remembered from the last `--address`
    pub peripheral_address: Option<String>,
    pub scan_timeout_secs: u64,
    pub write_without_response: bool,
}

impl Config {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            peripheral_address: None,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT,
            write_without_response: false,
        }
    }
}
