//! Worker handles for launched scrape runners. "Is a scrape live for this
//! user" is a derived query over this registry, not a mutable flag.

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// Handle to one background runner.
pub struct WorkerHandle {
    job_id: String,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn new(job_id: impl Into<String>, handle: JoinHandle<()>) -> Self {
        Self {
            job_id: job_id.into(),
            handle,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("job_id", &self.job_id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Per-user registry of live scrape workers. Finished handles are pruned
/// on every observation.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: DashMap<String, Vec<WorkerHandle>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: &str, handle: WorkerHandle) {
        let mut entry = self.workers.entry(user_id.to_string()).or_default();
        entry.retain(WorkerHandle::is_alive);
        entry.push(handle);
    }

    /// Drop finished handles for a user.
    pub fn prune(&self, user_id: &str) {
        if let Some(mut entry) = self.workers.get_mut(user_id) {
            entry.retain(WorkerHandle::is_alive);
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.workers.remove_if(user_id, |_, v| v.is_empty());
            }
        }
    }

    /// Job ids of this user's live workers.
    pub fn live_jobs(&self, user_id: &str) -> Vec<String> {
        self.prune(user_id);
        self.workers
            .get(user_id)
            .map(|entry| entry.iter().map(|w| w.job_id().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn any_live(&self, user_id: &str) -> bool {
        !self.live_jobs(user_id).is_empty()
    }
}
