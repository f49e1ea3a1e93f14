//! # insight-storage
//!
//! SQLite persistence layer for the Insight job pipeline.
//! Single write connection + read pool (WAL mode). All credit mutations go
//! through atomic single-statement updates; `debit_credits` is the sole
//! debit primitive and is linearizable on the `credits` column.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;
pub use queries::job_ops::JobPatch;

use insight_core::errors::{InsightError, StorageError};

/// Convert a rusqlite error into the storage error taxonomy, classifying
/// busy/locked failures as transient.
pub fn to_storage_err(e: rusqlite::Error) -> InsightError {
    let transient = matches!(
        &e,
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(
                f.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    );
    let message = e.to_string();
    if transient {
        InsightError::Storage(StorageError::Busy { message })
    } else {
        InsightError::Storage(StorageError::Sqlite { message })
    }
}
