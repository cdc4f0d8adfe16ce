//! Single consumer of the result stream.
//!
//! Classifies each outcome, invokes the update handler for successes and
//! routes failures to the error sink. Faults are isolated per item: no
//! outcome can halt the pipeline.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::outcome::{FailureKind, FetchOutcome};
use crate::traits::{ErrorSink, UpdateHandler};

/// Dispatch stage between the scheduler's result stream and the external
/// update handler.
///
/// Processes outcomes strictly sequentially, so the handler is never
/// invoked twice in parallel and may rely on that for read-modify-write
/// correctness.
pub struct DispatchProxy<H, S> {
    rx: mpsc::Receiver<FetchOutcome>,
    handler: H,
    sink: S,
    /// Where raw captures of unavailable targets are written, if anywhere.
    dump_dir: Option<PathBuf>,
}

impl<H: UpdateHandler, S: ErrorSink> DispatchProxy<H, S> {
    pub fn new(rx: mpsc::Receiver<FetchOutcome>, handler: H, sink: S) -> Self {
        Self {
            rx,
            handler,
            sink,
            dump_dir: None,
        }
    }

    /// Persist the raw HTML of unavailable targets under this directory
    /// for offline inspection.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Consume the stream until the scheduler closes it.
    pub async fn run(mut self) {
        while let Some(outcome) = self.rx.recv().await {
            self.dispatch(outcome).await;
        }
        tracing::info!("result stream closed, dispatch stopped");
    }

    async fn dispatch(&self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success(listing) => {
                tracing::debug!(url = %listing.url, price = listing.price, "dispatching update");
                match self.handler.handle(&listing).await {
                    Ok(()) => {}
                    Err(err @ AppError::Traced { .. }) => {
                        // Handler fault with a causal trace: report it and
                        // keep the pipeline moving.
                        tracing::warn!(
                            url = %listing.url,
                            trace = ?err.trace(),
                            %err,
                            "update handler failed"
                        );
                    }
                    Err(err) => self.sink.report(err),
                }
            }
            FetchOutcome::Failure { url, kind } => {
                if let FailureKind::TargetUnavailable {
                    raw_html: Some(html),
                } = &kind
                {
                    self.dump_capture(&url, html);
                }
                self.sink.report(kind.into_error(&url));
            }
        }
    }

    /// Best-effort: a failed dump is logged, never propagated.
    fn dump_capture(&self, url: &str, html: &str) {
        let Some(dir) = &self.dump_dir else {
            tracing::warn!(
                %url,
                bytes = html.len(),
                "target unavailable, captured content discarded (no dump dir)"
            );
            return;
        };

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = dir.join(format!("{}-{millis}.html", file_stem(url)));
        match std::fs::write(&path, html) {
            Ok(()) => {
                tracing::warn!(%url, path = %path.display(), "target unavailable, capture written");
            }
            Err(err) => tracing::warn!(%url, %err, "failed to write capture"),
        }
    }
}

/// A filesystem-safe name derived from a URL.
fn file_stem(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(64)
        .collect()
}
