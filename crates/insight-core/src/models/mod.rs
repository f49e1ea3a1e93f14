mod artifact;
mod job;
mod user;

pub use artifact::{
    product_key, Analysis, PainPoint, Post, Recommendation, RecommendationSet, Severity,
};
pub use job::{
    AnalysisParams, AnalysisResults, Job, JobParameters, JobResults, JobState, JobType, LogEntry,
    RecommendationKind, RecommendationsParams, RecommendationsResults, ScrapeParams,
    ScrapeResults, TimeFilter,
};
pub use user::User;
