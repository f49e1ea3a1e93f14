//! # insight-core
//!
//! Domain types, capability traits, errors, and configuration for the
//! Insight job pipeline. No I/O lives here; persistence and execution are
//! provided by `insight-storage` and `insight-engine`.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::InsightConfig;
pub use errors::{InsightError, InsightResult};
