//! # insight-engine
//!
//! The job lifecycle engine: request-side admission (`Dispatcher`), the
//! credit ledger, the job state machine (`JobRegistry`), per-type pipeline
//! runners on background workers, live log broadcast (`LogBus`), and the
//! stuck-job `Watchdog`.

pub mod dispatcher;
pub mod ledger;
pub mod logbus;
pub mod registry;
pub mod requests;
mod runners;
pub mod watchdog;
pub mod workers;

pub use dispatcher::Dispatcher;
pub use ledger::CreditLedger;
pub use logbus::{LogBus, LogStream};
pub use registry::JobRegistry;
pub use requests::{
    AnalysisAccepted, AnalysisRequest, CancelOutcome, RecommendationsAccepted,
    RecommendationsRequest, ScrapeAccepted, ScrapeRequest, SubredditsInput, UserStatus,
};
pub use watchdog::{Watchdog, WatchdogHandle};
pub use workers::{WorkerHandle, WorkerRegistry};
