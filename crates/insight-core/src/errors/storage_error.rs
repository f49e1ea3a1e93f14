/// Persistence-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    /// Database busy/locked. Retried with backoff by `update_job_state`.
    #[error("database busy: {message}")]
    Busy { message: String },

    #[error("storage retries exhausted after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },
}

impl StorageError {
    /// Transient errors are retried; everything else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Busy { .. })
    }
}
