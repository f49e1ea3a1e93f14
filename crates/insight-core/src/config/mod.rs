pub mod cost_config;
pub mod scrape_config;
pub mod storage_config;
pub mod watchdog_config;

use serde::{Deserialize, Serialize};

pub use cost_config::CostConfig;
pub use scrape_config::ScrapeConfig;
pub use storage_config::StorageConfig;
pub use watchdog_config::WatchdogConfig;

use crate::errors::{InsightError, InsightResult};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InsightConfig {
    pub storage: StorageConfig,
    pub watchdog: WatchdogConfig,
    pub scrape: ScrapeConfig,
    pub costs: CostConfig,
}

impl InsightConfig {
    /// Load config from a TOML string, falling back to defaults for missing
    /// fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Apply recognized `INSIGHT_*` environment overrides on top of the
    /// current values. Unparseable values are rejected rather than ignored.
    pub fn apply_env(mut self) -> InsightResult<Self> {
        if let Ok(path) = std::env::var("INSIGHT_DB_PATH") {
            self.storage.path = path;
        }
        if let Ok(v) = std::env::var("INSIGHT_WATCHDOG_INTERVAL_SECS") {
            self.watchdog.check_interval_secs = parse_env("INSIGHT_WATCHDOG_INTERVAL_SECS", &v)?;
        }
        if let Ok(v) = std::env::var("INSIGHT_JOB_TIMEOUT_MINUTES") {
            self.watchdog.timeout_minutes = parse_env("INSIGHT_JOB_TIMEOUT_MINUTES", &v)?;
        }
        if let Ok(v) = std::env::var("INSIGHT_SUBREDDIT_TIMEOUT_SECS") {
            self.scrape.per_subreddit_timeout_secs = parse_env("INSIGHT_SUBREDDIT_TIMEOUT_SECS", &v)?;
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> InsightResult<T> {
    value
        .parse()
        .map_err(|_| InsightError::Config(format!("invalid value for {key}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = InsightConfig::from_toml("[watchdog]\ntimeout_minutes = 5\n").unwrap();
        assert_eq!(cfg.watchdog.timeout_minutes, 5);
        assert_eq!(cfg.watchdog.check_interval_secs, 300);
        assert_eq!(cfg.scrape.per_subreddit_timeout_secs, 300);
        assert_eq!(cfg.costs.cancel_refund, 1);
        assert!(!cfg.scrape.default_subreddits.is_empty());
    }
}
