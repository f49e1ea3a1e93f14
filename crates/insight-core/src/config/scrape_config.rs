//! Scrape pipeline configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the scrape runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Seconds allowed per subreddit search before the scraper abandons it.
    pub per_subreddit_timeout_secs: u64,
    /// Fallback subreddit set used when the analyzer suggests nothing.
    pub default_subreddits: Vec<String>,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            per_subreddit_timeout_secs: 300,
            default_subreddits: [
                "programming",
                "webdev",
                "technology",
                "software",
                "productivity",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_limit: 100,
            max_limit: 1000,
        }
    }
}
