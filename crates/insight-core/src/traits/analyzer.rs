//! The LLM analysis capability seam. Concrete clients live outside the
//! core; runners hold an `Arc<dyn Analyzer>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::InsightResult;
use crate::models::{PainPoint, Post, Recommendation, RecommendationKind, Severity, TimeFilter};

/// Subreddit and query suggestions for a scrape topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubredditSuggestion {
    pub subreddits: Vec<String>,
    pub search_queries: Vec<String>,
    /// Only populated for custom-prompt topics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_time_filter: Option<TimeFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

/// One pain point extracted by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainPointFinding {
    pub name: String,
    pub description: String,
    pub severity: Severity,
    pub potential_solutions: String,
    #[serde(default)]
    pub related_keywords: Vec<String>,
}

/// Full pain-point analysis for a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainPointAnalysis {
    pub pain_points: Vec<PainPointFinding>,
    pub summary: String,
}

/// Generated recommendations for a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationOutput {
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// LLM-backed analysis operations. Errors are the analyzer's structured
/// failures (rate limits, malformed output); callers decide whether to
/// fall back or fail the job.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Suggest subreddits and search queries for a topic. `is_custom`
    /// marks free-form discovery prompts rather than product names.
    async fn suggest_subreddits(
        &self,
        topic: &str,
        is_custom: bool,
    ) -> InsightResult<SubredditSuggestion>;

    /// Extract common pain points for `product` from scraped posts.
    async fn analyze_pain_points(
        &self,
        posts: &[Post],
        product: &str,
    ) -> InsightResult<PainPointAnalysis>;

    /// Generate recommendations addressing the given pain points.
    async fn generate_recommendations(
        &self,
        pain_points: &[PainPoint],
        product: &str,
        kind: RecommendationKind,
        context: Option<&str>,
    ) -> InsightResult<RecommendationOutput>;
}
