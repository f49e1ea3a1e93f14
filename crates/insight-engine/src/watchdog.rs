//! Watchdog — periodic sweep that reaps jobs stuck past the timeout.
//!
//! Reaping does not refund credits: the runner's own failure path refunds,
//! and a reaper cannot tell whether the dead runner already did.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use insight_core::config::WatchdogConfig;
use insight_core::errors::InsightResult;
use insight_core::models::JobState;
use insight_storage::JobPatch;

use crate::registry::JobRegistry;

pub struct Watchdog {
    registry: Arc<JobRegistry>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(registry: Arc<JobRegistry>, config: WatchdogConfig) -> Self {
        Self { registry, config }
    }

    /// One sweep: fail every in_progress job whose `started_at` and every
    /// pending job whose `created_at` is older than the timeout. Returns
    /// the number of jobs reaped.
    pub async fn sweep(&self) -> InsightResult<usize> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::minutes(self.config.timeout_minutes);
        let (stuck_in_progress, stuck_pending) =
            self.registry.store().find_stuck_jobs(cutoff).await?;

        let mut reaped = 0;

        for job in stuck_in_progress {
            let minutes = job
                .started_at
                .map(|s| (now - s).num_minutes())
                .unwrap_or(self.config.timeout_minutes);
            let message = format!("Job timed out after {minutes} minutes");
            let patch = JobPatch {
                error: Some(message.clone()),
                ..Default::default()
            };
            if self
                .registry
                .transition(&job.id, &[JobState::InProgress], JobState::Failed, patch)
                .await?
            {
                warn!(job_id = %job.id, minutes, "reaped stuck in_progress job");
                reaped += 1;
            }
        }

        for job in stuck_pending {
            let patch = JobPatch {
                error: Some("Job timed out (pending too long)".to_string()),
                ..Default::default()
            };
            if self
                .registry
                .transition(&job.id, &[JobState::Pending], JobState::Failed, patch)
                .await?
            {
                warn!(job_id = %job.id, "reaped stale pending job");
                reaped += 1;
            }
        }

        Ok(reaped)
    }

    /// Run sweeps forever on an interval until the handle shuts it down.
    pub fn spawn(self) -> WatchdogHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = Duration::from_secs(self.config.check_interval_secs);
        info!(
            interval_secs = self.config.check_interval_secs,
            timeout_minutes = self.config.timeout_minutes,
            "watchdog started"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; wait a full interval
            // before the first sweep.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sweep().await {
                            Ok(reaped) if reaped > 0 => {
                                warn!(reaped, "watchdog marked stuck jobs as failed");
                            }
                            Ok(_) => {}
                            Err(e) => error!(error = %e, "watchdog sweep failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        WatchdogHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle for stopping the background sweep task.
pub struct WatchdogHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WatchdogHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

impl std::fmt::Debug for WatchdogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogHandle").finish_non_exhaustive()
    }
}
