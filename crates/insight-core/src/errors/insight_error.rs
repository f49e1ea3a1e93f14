use super::StorageError;

/// Top-level error type for the Insight pipeline.
/// Subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("invalid parameter: {0}")]
    Validation(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: job {job_id} belongs to another user")]
    Forbidden { job_id: String },

    #[error("job {job_id} is not cancellable from state {state}")]
    NotCancellable { job_id: String, state: String },

    #[error("scraper credentials unavailable")]
    CredentialsUnavailable,

    #[error("analyzer error: {0}")]
    Analyzer(String),

    #[error("scraper error: {0}")]
    Scraper(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias.
pub type InsightResult<T> = Result<T, InsightError>;
