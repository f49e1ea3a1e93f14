//! CreditLedger — the only path to a user's credit balance.
//!
//! Never reads-then-writes: every debit is the store's compare-and-update;
//! refunds are unconditional atomic adds.

use std::sync::Arc;

use tracing::{debug, warn};

use insight_core::config::CostConfig;
use insight_core::errors::{InsightError, InsightResult};
use insight_core::models::{JobParameters, TimeFilter, User};
use insight_storage::StorageEngine;

pub struct CreditLedger {
    store: Arc<StorageEngine>,
    costs: CostConfig,
}

impl CreditLedger {
    pub fn new(store: Arc<StorageEngine>, costs: CostConfig) -> Self {
        Self { store, costs }
    }

    /// Scrape cost from requested volume and time window. Small runs
    /// (limit ≤ 10) cost a flat 1 credit; larger runs scale with a limit
    /// tier and a time multiplier. An unknown filter gets multiplier 1.
    pub fn scrape_cost(limit: u32, time_filter: Option<TimeFilter>) -> i64 {
        if limit <= 10 {
            return 1;
        }
        let limit_tier = match limit {
            0..=50 => 1,
            51..=100 => 2,
            101..=200 => 3,
            _ => 4,
        };
        let time_multiplier = match time_filter {
            Some(TimeFilter::Hour) | Some(TimeFilter::Day) | Some(TimeFilter::Week) | None => 1,
            Some(TimeFilter::Month) => 2,
            Some(TimeFilter::Year) => 3,
            Some(TimeFilter::All) => 4,
        };
        limit_tier * (time_multiplier + 1)
    }

    /// Cost of admitting a job with the given typed parameters.
    pub fn cost_of(&self, parameters: &JobParameters) -> i64 {
        match parameters {
            JobParameters::Scrape(p) => Self::scrape_cost(p.limit, Some(p.time_filter)),
            JobParameters::Analysis(p) => {
                if p.regenerate {
                    self.costs.analysis_regenerate
                } else {
                    self.costs.analysis_first
                }
            }
            JobParameters::Recommendations(p) => {
                if p.regenerate {
                    self.costs.recommendations_regenerate
                } else {
                    self.costs.recommendations_first
                }
            }
        }
    }

    pub fn cancel_refund(&self) -> i64 {
        self.costs.cancel_refund
    }

    /// Debit `cost` credits atomically. Returns the post-image user, or
    /// `InsufficientCredits` carrying the required and available amounts.
    /// A negative cost is an invariant violation, never retried.
    pub async fn debit(&self, user_id: &str, cost: i64) -> InsightResult<User> {
        if cost < 0 {
            return Err(InsightError::Validation(format!(
                "debit cost must be non-negative, got {cost}"
            )));
        }
        match self.store.debit_credits(user_id, cost).await? {
            Some(user) => {
                debug!(user_id, cost, remaining = user.credits, "debited credits");
                Ok(user)
            }
            None => match self.store.find_user(user_id).await? {
                Some(user) => Err(InsightError::InsufficientCredits {
                    required: cost,
                    available: user.credits,
                }),
                None => Err(InsightError::NotFound(format!("user '{user_id}'"))),
            },
        }
    }

    /// Unconditional refund. A missing user is logged, not an error; the
    /// refund path runs inside failure handling and must not raise.
    pub async fn refund(&self, user_id: &str, amount: i64) -> InsightResult<()> {
        if amount <= 0 {
            return Ok(());
        }
        let credited = self.store.credit_credits(user_id, amount).await?;
        if credited {
            debug!(user_id, amount, "refunded credits");
        } else {
            warn!(user_id, amount, "refund target user not found");
        }
        Ok(())
    }
}
