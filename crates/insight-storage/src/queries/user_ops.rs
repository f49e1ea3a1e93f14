//! User rows and the atomic credit primitives.

use rusqlite::{params, Connection};

use insight_core::errors::InsightResult;
use insight_core::models::User;

use super::{parse_dt, OptionalRow};
use crate::to_storage_err;

pub fn insert_user(conn: &Connection, user: &User) -> InsightResult<()> {
    conn.execute(
        "INSERT INTO users (id, password_hash, email, credits, created_at, last_login)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.password_hash,
            user.email,
            user.credits,
            user.created_at.to_rfc3339(),
            user.last_login.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

pub fn find_user(conn: &Connection, id: &str) -> InsightResult<Option<User>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, password_hash, email, credits, created_at, last_login
             FROM users WHERE id = ?1",
        )
        .map_err(to_storage_err)?;

    let result = stmt
        .query_row(params![id], |row| Ok(row_to_user(row)))
        .optional()
        .map_err(to_storage_err)?;

    result.transpose()
}

/// Atomic debit-if-sufficient: updates the row matching
/// `{id, credits >= cost}` with `credits -= cost` and returns the
/// post-image, or `None` when the precondition failed. The sole debit
/// primitive; concurrent calls are linearized by SQLite's write lock.
pub fn debit_credits(conn: &Connection, user_id: &str, cost: i64) -> InsightResult<Option<User>> {
    let changed = conn
        .execute(
            "UPDATE users SET credits = credits - ?2 WHERE id = ?1 AND credits >= ?2",
            params![user_id, cost],
        )
        .map_err(to_storage_err)?;

    if changed == 0 {
        return Ok(None);
    }
    find_user(conn, user_id)
}

/// Unconditional atomic credit. Returns false when the user is unknown.
pub fn credit_credits(conn: &Connection, user_id: &str, amount: i64) -> InsightResult<bool> {
    let changed = conn
        .execute(
            "UPDATE users SET credits = credits + ?2 WHERE id = ?1",
            params![user_id, amount],
        )
        .map_err(to_storage_err)?;
    Ok(changed > 0)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> InsightResult<User> {
    let created_at: String = row.get(4).map_err(to_storage_err)?;
    let last_login: Option<String> = row.get(5).map_err(to_storage_err)?;
    Ok(User {
        id: row.get(0).map_err(to_storage_err)?,
        password_hash: row.get(1).map_err(to_storage_err)?,
        email: row.get(2).map_err(to_storage_err)?,
        credits: row.get(3).map_err(to_storage_err)?,
        created_at: parse_dt(&created_at)?,
        last_login: last_login.as_deref().map(parse_dt).transpose()?,
    })
}
