//! Persistence configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path. `:memory:` selects the in-memory mode used by
    /// tests.
    pub path: String,
    /// Read pool size; clamped to at least 1 by the pool.
    pub read_pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "insight.db".to_string(),
            read_pool_size: 4,
        }
    }
}
