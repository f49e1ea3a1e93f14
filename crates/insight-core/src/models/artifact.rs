//! Product artifacts: scraped posts, pain points, analyses, and
//! recommendation sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::RecommendationKind;

/// Normalized product key: trimmed and lowercased product name. All
/// artifact ownership is keyed on this form.
pub fn product_key(product: &str) -> String {
    product.trim().to_lowercase()
}

/// A raw scraped Reddit post, keyed by the external post id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
    pub num_comments: i64,
    /// Product attribution stamped at save time.
    pub product: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// A categorized pain point, owned per `(user, product)`. The full set for
/// a pair is replaced wholesale on re-analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PainPoint {
    pub user_id: String,
    pub product: String,
    pub topic: String,
    pub description: String,
    pub severity: Severity,
    pub potential_solutions: String,
    pub related_keywords: Vec<String>,
}

impl PainPoint {
    /// Stable document id: digest of `(user_id, product, topic)`.
    pub fn stable_id(&self) -> String {
        let digest = blake3::hash(
            format!("{}\u{1f}{}\u{1f}{}", self.user_id, self.product, self.topic).as_bytes(),
        );
        digest.to_hex().as_str()[..32].to_string()
    }
}

/// The synthesized analysis document. Exactly one per `(user, product)`;
/// replaced on regenerate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub user_id: String,
    pub product: String,
    pub summary: String,
    pub pain_points: Vec<PainPoint>,
    pub created_at: DateTime<Utc>,
}

/// A single generated recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub complexity: Severity,
    pub impact: Severity,
    #[serde(default)]
    pub addresses_pain_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_recent_occurrence: Option<String>,
}

/// The recommendation document for one `(user, product, kind)` triple.
/// Distinct kinds coexist; regenerating a kind overwrites only that kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub user_id: String,
    pub product: String,
    pub recommendation_type: RecommendationKind,
    pub recommendations: Vec<Recommendation>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_key_normalizes() {
        assert_eq!(product_key("  Notion "), "notion");
        assert_eq!(product_key("FIGMA"), "figma");
    }

    #[test]
    fn pain_point_id_is_stable_per_triple() {
        let a = PainPoint {
            user_id: "alice".into(),
            product: "notion".into(),
            topic: "sync lag".into(),
            description: "…".into(),
            severity: Severity::High,
            potential_solutions: "…".into(),
            related_keywords: vec![],
        };
        let mut b = a.clone();
        b.description = "different text".into();
        assert_eq!(a.stable_id(), b.stable_id());

        let mut c = a.clone();
        c.topic = "pricing".into();
        assert_ne!(a.stable_id(), c.stable_id());
    }
}
