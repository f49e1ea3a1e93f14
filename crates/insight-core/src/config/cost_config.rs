//! Credit cost table. Scrape costs are derived from limit and time filter;
//! the fixed costs here can be overridden by deployment config.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub analysis_first: i64,
    pub analysis_regenerate: i64,
    pub recommendations_first: i64,
    pub recommendations_regenerate: i64,
    /// Fixed refund applied on cancellation regardless of the original cost.
    pub cancel_refund: i64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            analysis_first: 0,
            analysis_regenerate: 1,
            recommendations_first: 2,
            recommendations_regenerate: 1,
            cancel_refund: 1,
        }
    }
}
