use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Fields extracted from one classified-ad page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub url: String,
    pub title: String,
    pub price: f64,
}

/// Why a fetch attempt produced no listing.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Content could not be retrieved or the expected fields were absent.
    /// Carries the captured page HTML, when any was retrieved, for
    /// offline inspection.
    TargetUnavailable { raw_html: Option<String> },

    /// Anything else, including an exceeded fetch deadline.
    Generic(String),
}

impl FailureKind {
    /// Convert into the error reported to the error sink.
    pub fn into_error(self, url: &str) -> AppError {
        match self {
            FailureKind::TargetUnavailable { .. } => AppError::TargetUnavailable {
                url: url.to_string(),
            },
            FailureKind::Generic(msg) => AppError::Generic(format!("{url}: {msg}")),
        }
    }
}

/// Tagged result of one fetch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Listing),
    Failure { url: String, kind: FailureKind },
}

impl FetchOutcome {
    /// The target this outcome belongs to.
    pub fn url(&self) -> &str {
        match self {
            FetchOutcome::Success(listing) => &listing.url,
            FetchOutcome::Failure { url, .. } => url,
        }
    }
}
