//! StorageEngine — the persistence facade used by the job engine.
//!
//! Owns the write connection and read pool. Every operation is
//! single-document-atomic; multi-document atomicity is never required by
//! callers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

use insight_core::errors::{InsightError, InsightResult, StorageError};
use insight_core::models::{
    Analysis, Job, JobParameters, JobState, LogEntry, PainPoint, Post, RecommendationKind,
    RecommendationSet, User,
};

use crate::migrations;
use crate::pool::{ReadPool, WriteConnection};
use crate::queries::{artifact_ops, job_ops, post_ops, user_ops};
use crate::to_storage_err;

const UPDATE_MAX_ATTEMPTS: u32 = 3;

pub struct StorageEngine {
    writer: Arc<WriteConnection>,
    readers: Arc<ReadPool>,
    /// In-memory databases are per-connection; reads route through the
    /// writer so they observe its data.
    in_memory: bool,
}

impl StorageEngine {
    /// Open (or create) the database at `path` with WAL mode and a read
    /// pool of `read_pool_size` connections (clamped to at least 1).
    pub fn open(path: &Path, read_pool_size: usize) -> InsightResult<Self> {
        let writer = Connection::open(path).map_err(to_storage_err)?;
        writer
            .pragma_update(None, "journal_mode", "WAL")
            .map_err(to_storage_err)?;
        writer
            .pragma_update(None, "busy_timeout", 5000)
            .map_err(to_storage_err)?;
        migrations::run_migrations(&writer)?;

        let pool_size = read_pool_size.max(1);
        let mut readers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open(path).map_err(to_storage_err)?;
            conn.pragma_update(None, "busy_timeout", 5000)
                .map_err(to_storage_err)?;
            readers.push(conn);
        }

        Ok(Self {
            writer: Arc::new(WriteConnection::new(writer)),
            readers: Arc::new(ReadPool::new(readers)),
            in_memory: false,
        })
    }

    /// Open an isolated in-memory database. Used by tests.
    pub fn open_in_memory() -> InsightResult<Self> {
        let writer = Connection::open_in_memory().map_err(to_storage_err)?;
        migrations::run_migrations(&writer)?;
        let reader = Connection::open_in_memory().map_err(to_storage_err)?;
        Ok(Self {
            writer: Arc::new(WriteConnection::new(writer)),
            readers: Arc::new(ReadPool::new(vec![reader])),
            in_memory: true,
        })
    }

    async fn read<F, T>(&self, f: F) -> InsightResult<T>
    where
        F: FnOnce(&Connection) -> InsightResult<T> + Send,
        T: Send,
    {
        if self.in_memory {
            self.writer.with_conn(f).await
        } else {
            self.readers.with_conn(f)
        }
    }

    // ─── Users & credits ─────────────────────────────────────────────────

    pub async fn insert_user(&self, user: &User) -> InsightResult<()> {
        let user = user.clone();
        self.writer
            .with_conn(move |conn| user_ops::insert_user(conn, &user))
            .await
    }

    pub async fn find_user(&self, id: &str) -> InsightResult<Option<User>> {
        self.read(|conn| user_ops::find_user(conn, id)).await
    }

    /// Atomic debit-if-sufficient. Returns the post-image on success, `None`
    /// when the user lacks `cost` credits. The sole debit primitive.
    pub async fn debit_credits(&self, user_id: &str, cost: i64) -> InsightResult<Option<User>> {
        self.writer
            .with_conn(move |conn| user_ops::debit_credits(conn, user_id, cost))
            .await
    }

    /// Unconditional atomic credit.
    pub async fn credit_credits(&self, user_id: &str, amount: i64) -> InsightResult<bool> {
        self.writer
            .with_conn(move |conn| user_ops::credit_credits(conn, user_id, amount))
            .await
    }

    // ─── Jobs ────────────────────────────────────────────────────────────

    /// Create a pending job and return its opaque id.
    pub async fn create_job(
        &self,
        user_id: &str,
        parameters: &JobParameters,
    ) -> InsightResult<String> {
        let job_id = Uuid::new_v4().to_string();
        let id = job_id.clone();
        let parameters = parameters.clone();
        self.writer
            .with_conn(move |conn| job_ops::create_job(conn, &id, user_id, &parameters))
            .await?;
        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: &str) -> InsightResult<Option<Job>> {
        self.read(|conn| job_ops::get_job(conn, job_id)).await
    }

    /// Set the job state (optionally guarded by a from-state predicate) plus
    /// patch fields in one write. Transient storage errors are retried with
    /// exponential backoff; retry exhaustion surfaces as
    /// `StorageError::RetriesExhausted`.
    pub async fn update_job_state(
        &self,
        job_id: &str,
        new_state: JobState,
        patch: &job_ops::JobPatch,
        from_states: Option<&[JobState]>,
    ) -> InsightResult<bool> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let patch = patch.clone();
            let result = self
                .writer
                .with_conn(move |conn| {
                    job_ops::update_job_state(conn, job_id, new_state, &patch, from_states)
                })
                .await;

            match result {
                Ok(updated) => return Ok(updated),
                Err(InsightError::Storage(e)) if e.is_transient() => {
                    if attempt >= UPDATE_MAX_ATTEMPTS {
                        return Err(InsightError::Storage(StorageError::RetriesExhausted {
                            attempts: attempt,
                            message: e.to_string(),
                        }));
                    }
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                    warn!(
                        job_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient storage error updating job state; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Append a log entry. Returns false when the job does not exist.
    pub async fn append_job_log(&self, job_id: &str, entry: &LogEntry) -> InsightResult<bool> {
        let entry = entry.clone();
        self.writer
            .with_conn(move |conn| job_ops::append_job_log(conn, job_id, &entry))
            .await
    }

    pub async fn list_user_jobs(
        &self,
        user_id: &str,
        state: Option<JobState>,
    ) -> InsightResult<Vec<Job>> {
        self.read(move |conn| job_ops::list_user_jobs(conn, user_id, state))
            .await
    }

    /// Jobs past the cutoff: (in_progress by started_at, pending by
    /// created_at).
    pub async fn find_stuck_jobs(
        &self,
        cutoff: DateTime<Utc>,
    ) -> InsightResult<(Vec<Job>, Vec<Job>)> {
        self.read(move |conn| job_ops::find_stuck_jobs(conn, cutoff))
            .await
    }

    pub async fn list_products(&self, user_id: &str) -> InsightResult<Vec<String>> {
        self.read(move |conn| job_ops::list_products(conn, user_id))
            .await
    }

    // ─── Posts ───────────────────────────────────────────────────────────

    pub async fn save_post(&self, post: &Post) -> InsightResult<()> {
        let post = post.clone();
        self.writer
            .with_conn(move |conn| post_ops::save_post(conn, &post))
            .await
    }

    pub async fn count_posts_for_product(&self, product: &str) -> InsightResult<u64> {
        self.read(move |conn| post_ops::count_posts_for_product(conn, product))
            .await
    }

    pub async fn load_posts_for_product(
        &self,
        product: &str,
        limit: u32,
    ) -> InsightResult<Vec<Post>> {
        self.read(move |conn| post_ops::load_posts_for_product(conn, product, limit))
            .await
    }

    // ─── Pain points ─────────────────────────────────────────────────────

    pub async fn save_pain_point(&self, pain_point: &PainPoint) -> InsightResult<()> {
        let pain_point = pain_point.clone();
        self.writer
            .with_conn(move |conn| artifact_ops::save_pain_point(conn, &pain_point))
            .await
    }

    pub async fn list_pain_points(
        &self,
        user_id: &str,
        product: Option<&str>,
    ) -> InsightResult<Vec<PainPoint>> {
        self.read(move |conn| artifact_ops::list_pain_points(conn, user_id, product))
            .await
    }

    pub async fn count_pain_points(&self, user_id: &str, product: &str) -> InsightResult<u64> {
        self.read(move |conn| artifact_ops::count_pain_points(conn, user_id, product))
            .await
    }

    pub async fn delete_pain_points_by_product(
        &self,
        user_id: &str,
        product: &str,
    ) -> InsightResult<u64> {
        self.writer
            .with_conn(move |conn| artifact_ops::delete_pain_points_by_product(conn, user_id, product))
            .await
    }

    // ─── Analyses ────────────────────────────────────────────────────────

    pub async fn save_analysis(&self, analysis: &Analysis) -> InsightResult<()> {
        let analysis = analysis.clone();
        self.writer
            .with_conn(move |conn| artifact_ops::save_analysis(conn, &analysis))
            .await
    }

    pub async fn get_analysis(
        &self,
        user_id: &str,
        product: &str,
    ) -> InsightResult<Option<Analysis>> {
        self.read(move |conn| artifact_ops::get_analysis(conn, user_id, product))
            .await
    }

    pub async fn delete_analysis(&self, user_id: &str, product: &str) -> InsightResult<bool> {
        self.writer
            .with_conn(move |conn| artifact_ops::delete_analysis(conn, user_id, product))
            .await
    }

    // ─── Recommendations ─────────────────────────────────────────────────

    pub async fn save_recommendations(&self, set: &RecommendationSet) -> InsightResult<()> {
        let set = set.clone();
        self.writer
            .with_conn(move |conn| artifact_ops::save_recommendations(conn, &set))
            .await
    }

    pub async fn get_recommendations(
        &self,
        user_id: &str,
        product: &str,
        kind: RecommendationKind,
    ) -> InsightResult<Option<RecommendationSet>> {
        self.read(move |conn| artifact_ops::get_recommendations(conn, user_id, product, kind))
            .await
    }

    /// Delete every recommendation type for `(user, product)`.
    pub async fn delete_recommendations_by_product(
        &self,
        user_id: &str,
        product: &str,
    ) -> InsightResult<u64> {
        self.writer
            .with_conn(move |conn| {
                artifact_ops::delete_recommendations_by_product(conn, user_id, product)
            })
            .await
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("in_memory", &self.in_memory)
            .field("readers", &self.readers)
            .finish_non_exhaustive()
    }
}
