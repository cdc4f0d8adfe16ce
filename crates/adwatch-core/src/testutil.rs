//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing assertions on
//! recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::outcome::{FetchOutcome, Listing};
use crate::traits::{ErrorSink, Extractor, TargetSource, UpdateHandler};

// ---------------------------------------------------------------------------
// ScriptedExtractor
// ---------------------------------------------------------------------------

/// Extractor that replies from a queue of scripted outcomes and records
/// every call. When the queue runs dry it succeeds with a fixed listing for
/// the requested URL.
#[derive(Clone)]
pub struct ScriptedExtractor {
    responses: Arc<Mutex<Vec<FetchOutcome>>>,
    delay: Duration,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedExtractor {
    /// Always succeeds immediately.
    pub fn ok() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<FetchOutcome>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make every fetch take this long, for in-flight/drain tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Extractor for ScriptedExtractor {
    async fn fetch(&self, url: &str, _deadline: Duration) -> FetchOutcome {
        self.calls.lock().unwrap().push(url.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        scripted.unwrap_or_else(|| {
            FetchOutcome::Success(Listing {
                url: url.to_string(),
                title: "mock listing".to_string(),
                price: 100.0,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingHandler
// ---------------------------------------------------------------------------

/// Update handler that records every listing it sees and replies from a
/// queue of scripted results. When the queue runs dry it returns `Ok(())`.
#[derive(Clone)]
pub struct RecordingHandler {
    pub handled: Arc<Mutex<Vec<Listing>>>,
    results: Arc<Mutex<Vec<Result<(), AppError>>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::with_results(Vec::new())
    }

    pub fn with_results(results: Vec<Result<(), AppError>>) -> Self {
        Self {
            handled: Arc::new(Mutex::new(Vec::new())),
            results: Arc::new(Mutex::new(results)),
        }
    }

    pub fn handled_urls(&self) -> Vec<String> {
        self.handled
            .lock()
            .unwrap()
            .iter()
            .map(|listing| listing.url.clone())
            .collect()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateHandler for RecordingHandler {
    async fn handle(&self, listing: &Listing) -> Result<(), AppError> {
        self.handled.lock().unwrap().push(listing.clone());
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            Ok(())
        } else {
            results.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Error sink that records every reported error.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub reports: Arc<Mutex<Vec<AppError>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, err: AppError) {
        self.reports.lock().unwrap().push(err);
    }
}

// ---------------------------------------------------------------------------
// StaticTargetSource
// ---------------------------------------------------------------------------

/// Target source backed by a fixed list, or a scripted seed failure.
pub struct StaticTargetSource {
    targets: Vec<String>,
    fail: bool,
}

impl StaticTargetSource {
    pub fn new(targets: &[&str]) -> Self {
        Self {
            targets: targets.iter().map(|s| s.to_string()).collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            targets: Vec::new(),
            fail: true,
        }
    }
}

impl TargetSource for StaticTargetSource {
    async fn initial_targets(&self) -> Result<Vec<String>, AppError> {
        if self.fail {
            return Err(AppError::Generic("seed source unavailable".into()));
        }
        Ok(self.targets.clone())
    }
}
