//! Error types for the scheduler.

use thiserror::Error;

use cadence_store::StoreError;

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur in the scheduler and task controller.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("keepalive refresh interval ({refresh_secs}s) must be shorter than the ttl ({ttl_secs}s)")]
    KeepaliveInterval { ttl_secs: u64, refresh_secs: u64 },
}
