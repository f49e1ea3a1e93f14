//! Versioned schema migrations, tracked via `PRAGMA user_version`.

pub mod v001_core_tables;
pub mod v002_recommendation_type_index;

use rusqlite::Connection;
use tracing::info;

use insight_core::errors::InsightResult;

use crate::to_storage_err;

const CURRENT_VERSION: i64 = 2;

/// Bring the database up to the current schema version.
pub fn run_migrations(conn: &Connection) -> InsightResult<()> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(to_storage_err)?;

    if version < 1 {
        v001_core_tables::migrate(conn)?;
    }
    if version < 2 {
        v002_recommendation_type_index::migrate(conn)?;
    }

    if version < CURRENT_VERSION {
        conn.pragma_update(None, "user_version", CURRENT_VERSION)
            .map_err(to_storage_err)?;
        info!(from_version = version, to_version = CURRENT_VERSION, "migrated schema");
    }
    Ok(())
}
