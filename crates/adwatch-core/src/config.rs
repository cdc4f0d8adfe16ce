use std::time::Duration;

use crate::error::AppError;

/// Construction-time knobs for the scheduling pipeline.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduler ticks.
    pub tick_interval: Duration,

    /// Maximum time one fetch may take.
    pub fetch_deadline: Duration,

    /// How long a fetched target stays cold before it is revisited.
    /// Should exceed the upstream cache lifetime; see [`crate::VisitCache`].
    pub cache_ttl: Duration,

    /// Result stream capacity. Keep small: a full stream blocks completing
    /// fetch tasks, not the tick loop.
    pub queue_capacity: usize,

    /// Cap on simultaneously in-flight fetches. `None` means unbounded,
    /// matching the historical behavior.
    pub max_in_flight: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            fetch_deadline: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
            queue_capacity: 2,
            max_in_flight: None,
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.tick_interval.is_zero() {
            return Err(AppError::Config("tick_interval must be non-zero".into()));
        }
        if self.fetch_deadline.is_zero() {
            return Err(AppError::Config("fetch_deadline must be non-zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(AppError::Config("queue_capacity must be at least 1".into()));
        }
        if self.max_in_flight == Some(0) {
            return Err(AppError::Config(
                "max_in_flight must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}
