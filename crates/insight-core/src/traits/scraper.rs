//! The Reddit scraping capability seam.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::InsightResult;
use crate::models::{Post, TimeFilter};

/// Reddit search operations. Implementations enforce
/// `per_subreddit_timeout` internally, abandoning a subreddit on expiry
/// and continuing with the next; only an all-subreddit failure surfaces
/// as an error.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Whether API credentials are configured. Admission rejects scrape
    /// requests when this is false.
    fn is_configured(&self) -> bool;

    /// Search the given subreddits for `query`, returning up to `limit`
    /// posts per subreddit within the time window.
    async fn search(
        &self,
        query: &str,
        subreddits: &[String],
        limit: u32,
        time_filter: TimeFilter,
        per_subreddit_timeout: Duration,
    ) -> InsightResult<Vec<Post>>;
}
