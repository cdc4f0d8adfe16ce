//! Target-scheduling and result-dispatch pipeline for the adwatch
//! listing watcher.
//!
//! A [`RingScheduler`] revisits a runtime-growable set of listing URLs in
//! round-robin order, gated by a TTL [`VisitCache`] so targets the upstream
//! still serves from its own cache are not re-fetched too soon. Extraction
//! outcomes flow through a bounded stream to a [`DispatchProxy`], which
//! feeds the external update handler and isolates per-item faults.

pub mod cache;
pub mod config;
pub mod error;
pub mod outcome;
pub mod proxy;
pub mod registry;
pub mod scheduler;
pub mod testutil;
pub mod traits;

pub use cache::VisitCache;
pub use config::SchedulerConfig;
pub use error::AppError;
pub use outcome::{FailureKind, FetchOutcome, Listing};
pub use proxy::DispatchProxy;
pub use registry::TargetRegistry;
pub use scheduler::RingScheduler;
