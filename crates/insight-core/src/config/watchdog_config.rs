//! Watchdog configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the stuck-job watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Seconds between sweeps.
    pub check_interval_secs: u64,
    /// Minutes after which an in_progress or pending job is reaped.
    pub timeout_minutes: i64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 300,
            timeout_minutes: 30,
        }
    }
}
