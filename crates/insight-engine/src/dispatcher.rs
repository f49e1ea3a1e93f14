//! Dispatcher — request-side admission control.
//!
//! Validates inputs, checks preconditions, debits credits atomically,
//! creates the job record, launches the runner on a background worker, and
//! returns the job id immediately. Also serves the read-side operations
//! (job queries, artifact getters, cancellation, live subscription).

use std::sync::Arc;

use tracing::{error, info};

use insight_core::config::InsightConfig;
use insight_core::errors::{InsightError, InsightResult};
use insight_core::models::{
    product_key, Analysis, AnalysisParams, Job, JobParameters, JobState, PainPoint, Post,
    RecommendationKind, RecommendationSet, RecommendationsParams, ScrapeParams, TimeFilter,
};
use insight_core::traits::{Analyzer, Scraper};
use insight_storage::{JobPatch, StorageEngine};

use crate::ledger::CreditLedger;
use crate::logbus::{LogBus, LogStream};
use crate::registry::JobRegistry;
use crate::requests::{
    AnalysisAccepted, AnalysisRequest, CancelOutcome, RecommendationsAccepted,
    RecommendationsRequest, ScrapeAccepted, ScrapeRequest, UserStatus,
};
use crate::runners::{self, RunnerContext};
use crate::workers::{WorkerHandle, WorkerRegistry};

const MAX_CONTEXT_CHARS: usize = 500;

pub struct Dispatcher {
    store: Arc<StorageEngine>,
    registry: Arc<JobRegistry>,
    ledger: Arc<CreditLedger>,
    bus: Arc<LogBus>,
    analyzer: Arc<dyn Analyzer>,
    scraper: Arc<dyn Scraper>,
    config: Arc<InsightConfig>,
    scrape_workers: WorkerRegistry,
}

impl Dispatcher {
    pub fn new(
        store: Arc<StorageEngine>,
        analyzer: Arc<dyn Analyzer>,
        scraper: Arc<dyn Scraper>,
        config: InsightConfig,
    ) -> Self {
        let bus = Arc::new(LogBus::new());
        let registry = Arc::new(JobRegistry::new(Arc::clone(&store), Arc::clone(&bus)));
        let ledger = Arc::new(CreditLedger::new(Arc::clone(&store), config.costs.clone()));
        Self {
            store,
            registry,
            ledger,
            bus,
            analyzer,
            scraper,
            config: Arc::new(config),
            scrape_workers: WorkerRegistry::new(),
        }
    }

    /// The registry, for wiring the watchdog to the same state machine.
    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    fn runner_context(&self) -> RunnerContext {
        RunnerContext {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            ledger: Arc::clone(&self.ledger),
            analyzer: Arc::clone(&self.analyzer),
            scraper: Arc::clone(&self.scraper),
            config: Arc::clone(&self.config),
        }
    }

    // ─── Job admission ───────────────────────────────────────────────────

    pub async fn start_scrape(
        &self,
        user_id: &str,
        request: ScrapeRequest,
    ) -> InsightResult<ScrapeAccepted> {
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(InsightError::Validation("topic is required".into()));
        }
        let limit = request.limit.unwrap_or(self.config.scrape.default_limit);
        if limit < 1 || limit > self.config.scrape.max_limit {
            return Err(InsightError::Validation(format!(
                "limit must be between 1 and {}",
                self.config.scrape.max_limit
            )));
        }
        let time_filter = match request.time_filter.as_deref() {
            Some(s) => TimeFilter::parse(s)
                .ok_or_else(|| InsightError::Validation(format!("invalid time_filter: {s}")))?,
            None => TimeFilter::Month,
        };
        let subreddits = request
            .subreddits
            .as_ref()
            .map(|input| input.normalize())
            .filter(|subs| !subs.is_empty());

        if !self.scraper.is_configured() {
            return Err(InsightError::CredentialsUnavailable);
        }

        let params = ScrapeParams {
            topic: topic.clone(),
            limit,
            time_filter,
            is_custom: request.is_custom,
            subreddits: subreddits.clone(),
        };
        let cost = CreditLedger::scrape_cost(limit, Some(time_filter));
        self.ledger.debit(user_id, cost).await?;

        let job_id = self
            .admit(user_id, JobParameters::Scrape(params.clone()), cost)
            .await?;

        let ctx = self.runner_context();
        let handle = tokio::spawn(runners::scrape::run(
            ctx,
            job_id.clone(),
            user_id.to_string(),
            params,
            cost,
        ));
        self.scrape_workers
            .register(user_id, WorkerHandle::new(job_id.clone(), handle));

        info!(user_id, job_id, topic = %topic, cost, "scrape job accepted");
        Ok(ScrapeAccepted {
            job_id,
            topic,
            subreddits,
        })
    }

    pub async fn start_analysis(
        &self,
        user_id: &str,
        request: AnalysisRequest,
    ) -> InsightResult<AnalysisAccepted> {
        let product = product_key(&request.product);
        if product.is_empty() {
            return Err(InsightError::Validation("product is required".into()));
        }
        let max_posts = request.max_posts.unwrap_or(500);
        if max_posts < 1 || max_posts > 1000 {
            return Err(InsightError::Validation(
                "max_posts must be between 1 and 1000".into(),
            ));
        }

        let post_count = self.store.count_posts_for_product(&product).await?;
        if post_count == 0 {
            return Err(InsightError::Precondition(format!(
                "no posts found for product '{product}'"
            )));
        }

        let params = AnalysisParams {
            product: product.clone(),
            max_posts,
            skip_recommendations: request.skip_recommendations,
            regenerate: request.regenerate,
        };
        let cost = self.ledger.cost_of(&JobParameters::Analysis(params.clone()));
        self.ledger.debit(user_id, cost).await?;

        // Regenerate supersedes prior artifacts before the runner starts.
        if request.regenerate {
            if let Err(e) = self.clear_product_artifacts(user_id, &product).await {
                self.compensate(user_id, cost).await;
                return Err(e);
            }
        }

        let job_id = self
            .admit(user_id, JobParameters::Analysis(params.clone()), cost)
            .await?;

        let ctx = self.runner_context();
        tokio::spawn(runners::analysis::run(
            ctx,
            job_id.clone(),
            user_id.to_string(),
            params,
            cost,
        ));

        info!(user_id, job_id, product = %product, cost, "analysis job accepted");
        Ok(AnalysisAccepted { job_id, product })
    }

    pub async fn start_recommendations(
        &self,
        user_id: &str,
        request: RecommendationsRequest,
    ) -> InsightResult<RecommendationsAccepted> {
        let product = request
            .products
            .first()
            .map(|p| product_key(p))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| InsightError::Validation("products must be a non-empty list".into()))?;
        let kind = RecommendationKind::parse(&request.recommendation_type).ok_or_else(|| {
            InsightError::Validation(format!(
                "invalid recommendation_type: {}",
                request.recommendation_type
            ))
        })?;
        if let Some(ref context) = request.context {
            if context.chars().count() > MAX_CONTEXT_CHARS {
                return Err(InsightError::Validation(format!(
                    "context must be at most {MAX_CONTEXT_CHARS} characters"
                )));
            }
        }

        let pain_point_count = self.store.count_pain_points(user_id, &product).await?;
        if pain_point_count == 0 {
            return Err(InsightError::Precondition(format!(
                "no pain points found for product '{product}'"
            )));
        }

        let params = RecommendationsParams {
            product: product.clone(),
            recommendation_type: kind,
            regenerate: request.regenerate,
            context: request.context.clone(),
        };
        let cost = self
            .ledger
            .cost_of(&JobParameters::Recommendations(params.clone()));
        self.ledger.debit(user_id, cost).await?;

        let job_id = self
            .admit(user_id, JobParameters::Recommendations(params.clone()), cost)
            .await?;

        let ctx = self.runner_context();
        tokio::spawn(runners::recommendations::run(
            ctx,
            job_id.clone(),
            user_id.to_string(),
            params,
            cost,
        ));

        info!(
            user_id,
            job_id,
            product = %product,
            kind = kind.as_str(),
            cost,
            "recommendations job accepted"
        );
        Ok(RecommendationsAccepted {
            job_id,
            product,
            recommendation_type: kind,
        })
    }

    /// Create the job record after a successful debit, crediting the cost
    /// back if creation fails.
    async fn admit(
        &self,
        user_id: &str,
        parameters: JobParameters,
        cost: i64,
    ) -> InsightResult<String> {
        match self.registry.create(user_id, &parameters).await {
            Ok(job_id) => Ok(job_id),
            Err(e) => {
                self.compensate(user_id, cost).await;
                Err(e)
            }
        }
    }

    async fn compensate(&self, user_id: &str, cost: i64) {
        if cost > 0 {
            if let Err(e) = self.ledger.refund(user_id, cost).await {
                error!(user_id, cost, error = %e, "compensating credit failed");
            }
        }
    }

    async fn clear_product_artifacts(&self, user_id: &str, product: &str) -> InsightResult<()> {
        self.store.delete_analysis(user_id, product).await?;
        self.store
            .delete_pain_points_by_product(user_id, product)
            .await?;
        self.store
            .delete_recommendations_by_product(user_id, product)
            .await?;
        Ok(())
    }

    // ─── Job queries & control ───────────────────────────────────────────

    /// Fetch one job, logs included. Ownership is enforced.
    pub async fn get_job(&self, user_id: &str, job_id: &str) -> InsightResult<Job> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| InsightError::NotFound(format!("job '{job_id}'")))?;
        if job.user_id != user_id {
            return Err(InsightError::Forbidden {
                job_id: job_id.to_string(),
            });
        }
        Ok(job)
    }

    /// The user's jobs, newest first, optionally filtered by state.
    pub async fn list_jobs(
        &self,
        user_id: &str,
        state: Option<JobState>,
    ) -> InsightResult<Vec<Job>> {
        self.registry.list(user_id, state).await
    }

    /// Cancel a pending or in-progress job. The fixed cancellation refund
    /// applies regardless of the job's original cost.
    pub async fn cancel_job(&self, user_id: &str, job_id: &str) -> InsightResult<CancelOutcome> {
        let job = self.get_job(user_id, job_id).await?;
        if job.state.is_terminal() {
            return Err(InsightError::NotCancellable {
                job_id: job_id.to_string(),
                state: job.state.to_string(),
            });
        }

        let cancelled = self
            .registry
            .transition(
                job_id,
                &[JobState::Pending, JobState::InProgress],
                JobState::Cancelled,
                JobPatch::default(),
            )
            .await?;
        if !cancelled {
            // Lost the race to a terminal write.
            return Err(InsightError::NotCancellable {
                job_id: job_id.to_string(),
                state: job.state.to_string(),
            });
        }

        let refund = self.ledger.cancel_refund();
        self.ledger.refund(user_id, refund).await?;
        let new_credits = self
            .store
            .find_user(user_id)
            .await?
            .map(|u| u.credits)
            .unwrap_or(0);

        info!(user_id, job_id, refund, "job cancelled");
        Ok(CancelOutcome {
            job_id: job_id.to_string(),
            new_credits,
        })
    }

    /// Subscribe to a job's live log entries. There is no replay; fetch the
    /// job once for history.
    pub async fn subscribe(&self, user_id: &str, job_id: &str) -> InsightResult<LogStream> {
        let job = self.get_job(user_id, job_id).await?;
        Ok(self.bus.subscribe(&job.id))
    }

    // ─── Artifact getters ────────────────────────────────────────────────

    /// Zero or one stored set for the `(user, product, type)` triple.
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        product: &str,
        kind: RecommendationKind,
    ) -> InsightResult<Vec<RecommendationSet>> {
        let product = product_key(product);
        Ok(self
            .store
            .get_recommendations(user_id, &product, kind)
            .await?
            .into_iter()
            .collect())
    }

    pub async fn get_analysis(&self, user_id: &str, product: &str) -> InsightResult<Vec<Analysis>> {
        let product = product_key(product);
        match self.store.get_analysis(user_id, &product).await? {
            Some(analysis) => Ok(vec![analysis]),
            None => Err(InsightError::NotFound(format!(
                "no analysis found for product '{product}'"
            ))),
        }
    }

    /// Distinct products from this user's past jobs.
    pub async fn list_products(&self, user_id: &str) -> InsightResult<Vec<String>> {
        self.store.list_products(user_id).await
    }

    pub async fn get_posts(&self, product: &str, limit: u32) -> InsightResult<Vec<Post>> {
        self.store
            .load_posts_for_product(&product_key(product), limit)
            .await
    }

    pub async fn get_pain_points(
        &self,
        user_id: &str,
        product: Option<&str>,
    ) -> InsightResult<Vec<PainPoint>> {
        let key = product.map(product_key);
        self.store.list_pain_points(user_id, key.as_deref()).await
    }

    /// Live-scrape status, derived from the worker registry.
    pub fn status(&self, user_id: &str) -> UserStatus {
        let active_scrape_jobs = self.scrape_workers.live_jobs(user_id);
        UserStatus {
            scrape_in_progress: !active_scrape_jobs.is_empty(),
            active_scrape_jobs,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
