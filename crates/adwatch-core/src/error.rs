use thiserror::Error;

/// Application-wide error types for adwatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// Target page could not be retrieved, or the expected fields were absent.
    #[error("target unavailable: {url}")]
    TargetUnavailable { url: String },

    /// A fetch exceeded its deadline.
    #[error("fetch timed out after {0} seconds")]
    Timeout(u64),

    /// Field extraction failed on retrieved content.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An error annotated with the call sites it passed through,
    /// outermost first.
    #[error("{source}")]
    Traced {
        source: Box<AppError>,
        trace: Vec<String>,
    },

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Annotate this error with a call site, starting a causal trace or
    /// prepending to an existing one.
    pub fn context(self, site: impl Into<String>) -> AppError {
        match self {
            AppError::Traced { source, mut trace } => {
                trace.insert(0, site.into());
                AppError::Traced { source, trace }
            }
            other => AppError::Traced {
                source: Box::new(other),
                trace: vec![site.into()],
            },
        }
    }

    /// The causal trace carried by this error, if any.
    pub fn trace(&self) -> Option<&[String]> {
        match self {
            AppError::Traced { trace, .. } => Some(trace),
            _ => None,
        }
    }
}
