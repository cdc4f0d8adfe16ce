use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::outcome::{FetchOutcome, Listing};

/// Fetches one target page and extracts the listing fields from it.
///
/// Implementations must never panic across this boundary: every failure
/// mode, including an exceeded deadline, is represented as a
/// [`FetchOutcome::Failure`].
pub trait Extractor: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        deadline: Duration,
    ) -> impl Future<Output = FetchOutcome> + Send;
}

/// Provides the targets that seed the registry before the scheduler starts.
///
/// A seed failure is the one fatal condition the pipeline recognizes; it is
/// surfaced to the caller of startup instead of being swallowed.
pub trait TargetSource: Send + Sync {
    fn initial_targets(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// Consumes successful extractions.
///
/// Invoked strictly sequentially by the dispatch stage, so implementations
/// may rely on never running concurrently with themselves.
pub trait UpdateHandler: Send + Sync {
    fn handle(&self, listing: &Listing) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Receives failures that cannot be handled at pipeline level.
pub trait ErrorSink: Send + Sync {
    /// Must not block indefinitely.
    fn report(&self, err: AppError);
}
