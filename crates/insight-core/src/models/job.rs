//! Job records: typed parameters and results, the state machine vocabulary,
//! and append-only log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::product_key;

/// The three pipeline job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Scrape,
    Analysis,
    Recommendations,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Scrape => "scrape",
            JobType::Analysis => "analysis",
            JobType::Recommendations => "recommendations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scrape" => Some(JobType::Scrape),
            "analysis" => Some(JobType::Analysis),
            "recommendations" => Some(JobType::Recommendations),
            _ => None,
        }
    }
}

/// Job lifecycle states. Transitions form a DAG:
/// `pending → in_progress → {completed, failed}`, `pending → cancelled`,
/// `in_progress → cancelled`. Terminal states admit no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::InProgress => "in_progress",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "in_progress" => Some(JobState::InProgress),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reddit search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hour" => Some(TimeFilter::Hour),
            "day" => Some(TimeFilter::Day),
            "week" => Some(TimeFilter::Week),
            "month" => Some(TimeFilter::Month),
            "year" => Some(TimeFilter::Year),
            "all" => Some(TimeFilter::All),
            _ => None,
        }
    }
}

/// Recommendation document flavor. One stored document per
/// `(user, product, kind)`; different kinds coexist for the same product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ImproveProduct,
    NewFeature,
    CompetingProduct,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::ImproveProduct => "improve_product",
            RecommendationKind::NewFeature => "new_feature",
            RecommendationKind::CompetingProduct => "competing_product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "improve_product" => Some(RecommendationKind::ImproveProduct),
            "new_feature" => Some(RecommendationKind::NewFeature),
            "competing_product" => Some(RecommendationKind::CompetingProduct),
            _ => None,
        }
    }
}

/// Parameters for a scrape job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeParams {
    pub topic: String,
    pub limit: u32,
    pub time_filter: TimeFilter,
    pub is_custom: bool,
    /// Caller-supplied subreddits; when absent the analyzer suggests a set.
    pub subreddits: Option<Vec<String>>,
}

/// Parameters for an analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub product: String,
    pub max_posts: u32,
    pub skip_recommendations: bool,
    pub regenerate: bool,
}

/// Parameters for a recommendations job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsParams {
    pub product: String,
    pub recommendation_type: RecommendationKind,
    pub regenerate: bool,
    pub context: Option<String>,
}

/// Typed job parameters. Persisted as a schemaless JSON document; in-core
/// code always operates on this tagged variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobParameters {
    Scrape(ScrapeParams),
    Analysis(AnalysisParams),
    Recommendations(RecommendationsParams),
}

impl JobParameters {
    pub fn job_type(&self) -> JobType {
        match self {
            JobParameters::Scrape(_) => JobType::Scrape,
            JobParameters::Analysis(_) => JobType::Analysis,
            JobParameters::Recommendations(_) => JobType::Recommendations,
        }
    }

    /// The normalized product this job is about (scrape topic included).
    pub fn product(&self) -> String {
        match self {
            JobParameters::Scrape(p) => product_key(&p.topic),
            JobParameters::Analysis(p) => product_key(&p.product),
            JobParameters::Recommendations(p) => product_key(&p.product),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResults {
    pub posts_count: usize,
    pub total_posts_found: usize,
    pub subreddits_used: Vec<String>,
    pub topic: String,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub pain_points_count: usize,
    pub recommendations_count: usize,
    pub product: String,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResults {
    pub product: String,
    pub recommendation_type: RecommendationKind,
    pub recommendations_count: usize,
}

/// Typed job results, parallel to [`JobParameters`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResults {
    Scrape(ScrapeResults),
    Analysis(AnalysisResults),
    Recommendations(RecommendationsResults),
}

/// One pipeline step observation. Append-only; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Stable step identifier, e.g. `subreddits`, `find_posts`, `completed`.
    pub step: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        step: impl Into<String>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// A unit of asynchronous work: typed parameters, a state, ordered logs,
/// and (on success) a results record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub job_type: JobType,
    pub state: JobState,
    pub parameters: JobParameters,
    pub results: Option<JobResults>,
    pub error: Option<String>,
    /// Set at most once, by a terminal transition.
    pub credits_used: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
}
