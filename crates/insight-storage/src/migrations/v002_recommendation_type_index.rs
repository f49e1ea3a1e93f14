//! v002: one recommendation document per (user, product, type).
//!
//! The legacy unique index on (user_id, product) must be dropped before
//! the triple index is created; coexistence would break multi-type
//! storage.

use rusqlite::Connection;

use insight_core::errors::InsightResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> InsightResult<()> {
    conn.execute_batch(
        "
        DROP INDEX IF EXISTS idx_recommendations_user_product;

        CREATE UNIQUE INDEX IF NOT EXISTS idx_recommendations_user_product_type
            ON recommendations(user_id, product, recommendation_type);
        ",
    )
    .map_err(to_storage_err)?;
    Ok(())
}
