mod analyzer;
mod scraper;

pub use analyzer::{Analyzer, PainPointAnalysis, PainPointFinding, RecommendationOutput, SubredditSuggestion};
pub use scraper::Scraper;
