//! JobRegistry — owns the job state machine.
//!
//! All state changes go through `transition`, which encodes the allowed
//! from-states directly in the store's conditional update, so a terminal
//! state can never be left even under concurrent writers.

use std::sync::Arc;

use tracing::warn;

use insight_core::errors::InsightResult;
use insight_core::models::{Job, JobParameters, JobState, LogEntry};
use insight_storage::{JobPatch, StorageEngine};

use crate::logbus::LogBus;

pub struct JobRegistry {
    store: Arc<StorageEngine>,
    bus: Arc<LogBus>,
}

impl JobRegistry {
    pub fn new(store: Arc<StorageEngine>, bus: Arc<LogBus>) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &Arc<StorageEngine> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<LogBus> {
        &self.bus
    }

    pub async fn create(&self, user_id: &str, parameters: &JobParameters) -> InsightResult<String> {
        self.store.create_job(user_id, parameters).await
    }

    pub async fn get(&self, job_id: &str) -> InsightResult<Option<Job>> {
        self.store.get_job(job_id).await
    }

    pub async fn list(
        &self,
        user_id: &str,
        state: Option<JobState>,
    ) -> InsightResult<Vec<Job>> {
        self.store.list_user_jobs(user_id, state).await
    }

    /// Atomically move a job from one of `from` to `to`, applying `patch`
    /// in the same write. Returns false when the job was not in an allowed
    /// state. Terminal states are never allowed as a source.
    pub async fn transition(
        &self,
        job_id: &str,
        from: &[JobState],
        to: JobState,
        patch: JobPatch,
    ) -> InsightResult<bool> {
        let allowed: Vec<JobState> = from
            .iter()
            .copied()
            .filter(|s| !s.is_terminal())
            .collect();
        if allowed.is_empty() {
            return Ok(false);
        }
        self.store
            .update_job_state(job_id, to, &patch, Some(&allowed))
            .await
    }

    /// Persist a log entry, then broadcast it to live subscribers. The
    /// append is the source of truth; broadcast is best-effort.
    pub async fn append_log(
        &self,
        job_id: &str,
        step: &str,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> InsightResult<()> {
        let entry = LogEntry::new(step, message, details);
        let appended = self.store.append_job_log(job_id, &entry).await?;
        if appended {
            self.bus.publish(job_id, &entry);
        } else {
            warn!(job_id, step, "log append against unknown job");
        }
        Ok(())
    }
}
