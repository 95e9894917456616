//! Error types for garbage collection passes.

use thiserror::Error;

use cadence_store::StoreError;

/// Result type alias for GC operations.
pub type GcResult<T> = Result<T, GcError>;

/// Errors that abort a GC pass. Upstream failures leave the remaining
/// reconciliation undone; the pass is retried on its next scheduled run.
#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("upstream reconciliation failed: {0}")]
    Upstream(anyhow::Error),

    #[error("invalid filter regexp {pattern:?}: {source}")]
    InvalidRegexp {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
