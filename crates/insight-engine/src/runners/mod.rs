//! Pipeline runners: one single-pass executor per job type, launched on a
//! background worker. Runners never raise out of the worker body; every
//! path ends in a terminal transition (or observes that another writer got
//! there first and exits quietly).

pub(crate) mod analysis;
pub(crate) mod recommendations;
pub(crate) mod scrape;

use std::sync::Arc;

use tracing::{debug, error};

use insight_core::config::InsightConfig;
use insight_core::errors::InsightError;
use insight_core::models::{JobResults, JobState};
use insight_core::traits::{Analyzer, Scraper};
use insight_storage::{JobPatch, StorageEngine};

use crate::ledger::CreditLedger;
use crate::registry::JobRegistry;

/// Everything a runner needs, cloned per launch.
#[derive(Clone)]
pub(crate) struct RunnerContext {
    pub store: Arc<StorageEngine>,
    pub registry: Arc<JobRegistry>,
    pub ledger: Arc<CreditLedger>,
    pub analyzer: Arc<dyn Analyzer>,
    pub scraper: Arc<dyn Scraper>,
    pub config: Arc<InsightConfig>,
}

/// Move the job from pending to in_progress. A false return means the job
/// was cancelled (or reaped) before the worker got scheduled; the runner
/// must not proceed.
pub(crate) async fn start_job(ctx: &RunnerContext, job_id: &str) -> bool {
    match ctx
        .registry
        .transition(
            job_id,
            &[JobState::Pending],
            JobState::InProgress,
            JobPatch::default(),
        )
        .await
    {
        Ok(started) => {
            if !started {
                debug!(job_id, "job no longer pending; runner exiting");
            }
            started
        }
        Err(e) => {
            error!(job_id, error = %e, "failed to start job");
            false
        }
    }
}

/// Cooperative cancellation check between pipeline steps. The job's stored
/// state is the only authoritative cancellation signal.
pub(crate) async fn is_cancelled(ctx: &RunnerContext, job_id: &str) -> bool {
    match ctx.registry.get(job_id).await {
        Ok(Some(job)) => job.state == JobState::Cancelled,
        Ok(None) => true,
        Err(e) => {
            error!(job_id, error = %e, "cancellation check failed; continuing");
            false
        }
    }
}

/// Terminal success: the `completed` log entry, then the state write. A
/// rejected state write (the job went terminal first) is accepted silently.
pub(crate) async fn finalize_success(
    ctx: &RunnerContext,
    job_id: &str,
    message: String,
    results: JobResults,
    credits_used: i64,
) {
    let details = serde_json::to_value(&results).ok();
    if let Err(e) = ctx
        .registry
        .append_log(job_id, "completed", message, details)
        .await
    {
        error!(job_id, error = %e, "failed to append completed log");
    }

    let patch = JobPatch {
        results: Some(results),
        credits_used: Some(credits_used),
        ..Default::default()
    };
    match ctx
        .registry
        .transition(job_id, &[JobState::InProgress], JobState::Completed, patch)
        .await
    {
        Ok(true) => debug!(job_id, "job completed"),
        Ok(false) => debug!(job_id, "completion rejected; job already terminal"),
        Err(e) => error!(job_id, error = %e, "failed to finalize success"),
    }
}

/// Terminal failure: the `failed` log entry, the state write, then the
/// refund of whatever this admission debited. Refund only follows a state
/// write this runner actually won; if cancellation got there first, its
/// own refund already happened.
pub(crate) async fn finalize_failure(
    ctx: &RunnerContext,
    job_id: &str,
    user_id: &str,
    error_message: &str,
    debited: i64,
) {
    if let Err(e) = ctx
        .registry
        .append_log(job_id, "failed", error_message.to_string(), None)
        .await
    {
        error!(job_id, error = %e, "failed to append failure log");
    }

    let patch = JobPatch {
        error: Some(error_message.to_string()),
        credits_used: Some(debited),
        ..Default::default()
    };
    let transitioned = match ctx
        .registry
        .transition(job_id, &[JobState::InProgress], JobState::Failed, patch)
        .await
    {
        Ok(t) => t,
        Err(e) => {
            error!(job_id, error = %e, "failed to finalize failure");
            false
        }
    };

    if transitioned && debited > 0 {
        if let Err(e) = ctx.ledger.refund(user_id, debited).await {
            error!(job_id, user_id, error = %e, "refund failed");
        }
    }
}

/// User-facing message for an external failure: the analyzer's or
/// scraper's own diagnostic, without the error-kind prefix.
pub(crate) fn error_message(e: &InsightError) -> String {
    match e {
        InsightError::Analyzer(msg) | InsightError::Scraper(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Wall-clock minutes since `started`, for result payloads.
pub(crate) fn minutes_since(started: chrono::DateTime<chrono::Utc>) -> f64 {
    let secs = (chrono::Utc::now() - started).num_milliseconds() as f64 / 1000.0;
    (secs / 60.0 * 100.0).round() / 100.0
}
