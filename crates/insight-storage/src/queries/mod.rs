pub mod artifact_ops;
pub mod job_ops;
pub mod post_ops;
pub mod user_ops;

/// Helper trait to make `query_row` return `Option` on not-found.
pub(crate) trait OptionalRow<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalRow<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Parse an RFC 3339 column value.
pub(crate) fn parse_dt(
    s: &str,
) -> insight_core::errors::InsightResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| {
            insight_core::errors::InsightError::Storage(
                insight_core::errors::StorageError::Sqlite {
                    message: format!("parse datetime '{s}': {e}"),
                },
            )
        })
}
