//! Error types for store operations.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during entity store or task coordinator
/// operations. Store I/O errors are always propagated to the caller,
/// never swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to backend: {0}")]
    Connection(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("store lock poisoned")]
    Lock,
}
