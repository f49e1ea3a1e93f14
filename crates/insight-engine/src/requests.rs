//! Transport-agnostic request and response records for the dispatcher
//! operations. Every request is accompanied by an authenticated user id
//! supplied by the caller.

use serde::{Deserialize, Serialize};

use insight_core::models::RecommendationKind;

/// Subreddits arrive either as a list or a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubredditsInput {
    List(Vec<String>),
    Csv(String),
}

impl SubredditsInput {
    /// Trimmed, non-empty subreddit names.
    pub fn normalize(&self) -> Vec<String> {
        let items: Vec<&str> = match self {
            SubredditsInput::List(list) => list.iter().map(String::as_str).collect(),
            SubredditsInput::Csv(csv) => csv.split(',').collect(),
        };
        items
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_start_matches("r/").to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    pub topic: String,
    pub limit: Option<u32>,
    pub time_filter: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
    pub subreddits: Option<SubredditsInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeAccepted {
    pub job_id: String,
    pub topic: String,
    /// Caller-supplied subreddits; absent when the analyzer will choose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subreddits: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub product: String,
    pub max_posts: Option<u32>,
    #[serde(default)]
    pub skip_recommendations: bool,
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisAccepted {
    pub job_id: String,
    pub product: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationsRequest {
    /// Non-empty; only the first product is used.
    pub products: Vec<String>,
    pub recommendation_type: String,
    pub context: Option<String>,
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationsAccepted {
    pub job_id: String,
    pub product: String,
    pub recommendation_type: RecommendationKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub job_id: String,
    pub new_credits: i64,
}

/// Observability snapshot derived from the scrape worker registry.
#[derive(Debug, Clone, Serialize)]
pub struct UserStatus {
    pub scrape_in_progress: bool,
    pub active_scrape_jobs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_subreddits_normalize() {
        let input = SubredditsInput::Csv("r/programming, webdev ,, rust ".to_string());
        assert_eq!(input.normalize(), vec!["programming", "webdev", "rust"]);
    }

    #[test]
    fn list_subreddits_normalize() {
        let input = SubredditsInput::List(vec![" productivity ".into(), "".into()]);
        assert_eq!(input.normalize(), vec!["productivity"]);
    }
}
