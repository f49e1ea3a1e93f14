//! Shared fixtures: stub analyzer/scraper implementations and harness
//! helpers for lifecycle tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use insight_core::errors::{InsightError, InsightResult};
use insight_core::models::{
    Job, PainPoint, Post, Recommendation, RecommendationKind, Severity, TimeFilter, User,
};
use insight_core::traits::{
    Analyzer, PainPointAnalysis, PainPointFinding, RecommendationOutput, Scraper,
    SubredditSuggestion,
};
use insight_core::InsightConfig;
use insight_engine::Dispatcher;
use insight_storage::StorageEngine;

// ─── Stub analyzer ───────────────────────────────────────────────────────────

pub struct StubAnalyzer {
    pub subreddits: Vec<String>,
    pub search_queries: Vec<String>,
    pub findings: Vec<PainPointFinding>,
    pub recommendations: Vec<Recommendation>,
    /// When set, `analyze_pain_points` fails with this message.
    pub fail_analysis: Option<String>,
    /// When set, `generate_recommendations` fails with this message.
    pub fail_recommendations: Option<String>,
    /// When set, `analyze_pain_points` blocks until notified.
    pub analysis_gate: Option<Arc<Notify>>,
}

impl Default for StubAnalyzer {
    fn default() -> Self {
        Self {
            subreddits: vec!["productivity".to_string()],
            search_queries: vec!["test query".to_string()],
            findings: vec![PainPointFinding {
                name: "sync lag".to_string(),
                description: "documents take seconds to sync".to_string(),
                severity: Severity::High,
                potential_solutions: "delta sync".to_string(),
                related_keywords: vec!["slow".to_string(), "sync".to_string()],
            }],
            recommendations: vec![Recommendation {
                title: "incremental sync".to_string(),
                description: "sync only changed blocks".to_string(),
                complexity: Severity::Medium,
                impact: Severity::High,
                addresses_pain_points: vec!["sync lag".to_string()],
                most_recent_occurrence: None,
            }],
            fail_analysis: None,
            fail_recommendations: None,
            analysis_gate: None,
        }
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn suggest_subreddits(
        &self,
        _topic: &str,
        _is_custom: bool,
    ) -> InsightResult<SubredditSuggestion> {
        Ok(SubredditSuggestion {
            subreddits: self.subreddits.clone(),
            search_queries: self.search_queries.clone(),
            recommended_time_filter: None,
            strategy: None,
        })
    }

    async fn analyze_pain_points(
        &self,
        _posts: &[Post],
        _product: &str,
    ) -> InsightResult<PainPointAnalysis> {
        if let Some(gate) = &self.analysis_gate {
            gate.notified().await;
        }
        if let Some(message) = &self.fail_analysis {
            return Err(InsightError::Analyzer(message.clone()));
        }
        Ok(PainPointAnalysis {
            pain_points: self.findings.clone(),
            summary: "stub summary".to_string(),
        })
    }

    async fn generate_recommendations(
        &self,
        _pain_points: &[PainPoint],
        _product: &str,
        kind: RecommendationKind,
        _context: Option<&str>,
    ) -> InsightResult<RecommendationOutput> {
        if let Some(message) = &self.fail_recommendations {
            return Err(InsightError::Analyzer(message.clone()));
        }
        let mut recommendations = self.recommendations.clone();
        for rec in &mut recommendations {
            rec.title = format!("{} ({})", rec.title, kind.as_str());
        }
        Ok(RecommendationOutput {
            recommendations,
            summary: Some("stub recommendation summary".to_string()),
        })
    }
}

// ─── Stub scraper ────────────────────────────────────────────────────────────

pub struct StubScraper {
    pub posts_per_query: usize,
    pub configured: bool,
    /// When true, every search fails with a timeout-style error.
    pub fail: bool,
}

impl Default for StubScraper {
    fn default() -> Self {
        Self {
            posts_per_query: 3,
            configured: true,
            fail: false,
        }
    }
}

#[async_trait]
impl Scraper for StubScraper {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search(
        &self,
        _query: &str,
        subreddits: &[String],
        _limit: u32,
        _time_filter: TimeFilter,
        _per_subreddit_timeout: Duration,
    ) -> InsightResult<Vec<Post>> {
        if self.fail {
            return Err(InsightError::Scraper(
                "subreddit search timed out".to_string(),
            ));
        }
        let subreddit = subreddits
            .first()
            .cloned()
            .unwrap_or_else(|| "productivity".to_string());
        Ok((0..self.posts_per_query)
            .map(|i| Post {
                id: format!("t3_stub{i}"),
                title: format!("stub post {i}"),
                content: "stub content".to_string(),
                author: "stub_author".to_string(),
                subreddit: subreddit.clone(),
                url: format!("https://reddit.com/t3_stub{i}"),
                created_utc: Utc::now(),
                score: 10,
                num_comments: 2,
                product: String::new(),
            })
            .collect())
    }
}

// ─── Harness helpers ─────────────────────────────────────────────────────────

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn harness(analyzer: StubAnalyzer, scraper: StubScraper) -> (Arc<StorageEngine>, Dispatcher) {
    init_tracing();
    let store = Arc::new(StorageEngine::open_in_memory().unwrap());
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::new(analyzer),
        Arc::new(scraper),
        InsightConfig::default(),
    );
    (store, dispatcher)
}

pub async fn add_user(store: &StorageEngine, id: &str, credits: i64) {
    store.insert_user(&User::new(id, "hash", credits)).await.unwrap();
}

pub async fn credits_of(store: &StorageEngine, id: &str) -> i64 {
    store.find_user(id).await.unwrap().unwrap().credits
}

pub async fn seed_posts(store: &StorageEngine, product: &str, count: usize) {
    for i in 0..count {
        let post = Post {
            id: format!("t3_seed_{product}_{i}"),
            title: format!("seeded post {i}"),
            content: "seeded content".to_string(),
            author: "seeder".to_string(),
            subreddit: "productivity".to_string(),
            url: format!("https://reddit.com/t3_seed_{i}"),
            created_utc: Utc::now(),
            score: 5,
            num_comments: 1,
            product: product.to_string(),
        };
        store.save_post(&post).await.unwrap();
    }
}

pub async fn seed_pain_points(store: &StorageEngine, user: &str, product: &str, count: usize) {
    for i in 0..count {
        let pain_point = PainPoint {
            user_id: user.to_string(),
            product: product.to_string(),
            topic: format!("pain {i}"),
            description: format!("description {i}"),
            severity: Severity::Medium,
            potential_solutions: "workaround".to_string(),
            related_keywords: vec![],
        };
        store.save_pain_point(&pain_point).await.unwrap();
    }
}

/// Poll until the job reaches a terminal state.
pub async fn wait_for_terminal(store: &StorageEngine, job_id: &str) -> Job {
    for _ in 0..500 {
        if let Some(job) = store.get_job(job_id).await.unwrap() {
            if job.state.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state in time");
}
