//! Connection handling: one serialized write connection plus a round-robin
//! read pool. WAL mode lets readers see committed writes immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;

use insight_core::errors::{InsightError, InsightResult, StorageError};

/// The single write connection. All writes are serialized through an async
/// mutex so concurrent writers queue rather than contend on SQLITE_BUSY.
pub struct WriteConnection {
    conn: tokio::sync::Mutex<Connection>,
}

impl WriteConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: tokio::sync::Mutex::new(conn),
        }
    }

    /// Run `f` while holding the write connection.
    pub async fn with_conn<F, T>(&self, f: F) -> InsightResult<T>
    where
        F: FnOnce(&Connection) -> InsightResult<T> + Send,
        T: Send,
    {
        let guard = self.conn.lock().await;
        f(&guard)
    }
}

impl std::fmt::Debug for WriteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteConnection").finish_non_exhaustive()
    }
}

/// Round-robin pool of read connections.
pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Build a pool from pre-opened connections. At least one connection is
    /// required.
    pub fn new(conns: Vec<Connection>) -> Self {
        debug_assert!(!conns.is_empty(), "read pool needs at least one connection");
        Self {
            conns: conns.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Run `f` on the next read connection in round-robin order.
    pub fn with_conn<F, T>(&self, f: F) -> InsightResult<T>
    where
        F: FnOnce(&Connection) -> InsightResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let guard = self.conns[idx].lock().map_err(|_| {
            InsightError::Storage(StorageError::Sqlite {
                message: "read connection poisoned".to_string(),
            })
        })?;
        f(&guard)
    }
}

impl std::fmt::Debug for ReadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPool")
            .field("size", &self.conns.len())
            .finish()
    }
}
