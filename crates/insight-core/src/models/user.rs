use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account. `credits` is the only field the pipeline mutates, and
/// every mutation goes through the store's atomic credit primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub password_hash: String,
    pub email: Option<String>,
    /// Non-negative by invariant; the debit CAS never lets it go below zero.
    pub credits: i64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// A fresh account with the given starting credit balance.
    pub fn new(id: impl Into<String>, password_hash: impl Into<String>, credits: i64) -> Self {
        Self {
            id: id.into(),
            password_hash: password_hash.into(),
            email: None,
            credits,
            created_at: Utc::now(),
            last_login: None,
        }
    }
}
