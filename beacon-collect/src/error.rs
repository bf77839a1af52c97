//! Collect core error types.

use thiserror::Error;

/// Result type for collect operations.
pub type CollectResult<T> = Result<T, CollectError>;

/// Errors that can occur in the collect core.
///
/// Transport failures are deliberately absent: they are outcomes the
/// dispatcher absorbs (persist and retry), never errors surfaced to callers.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Push-API misuse; the requested write would produce malformed JSON.
    #[error("invalid push sequence: {0}")]
    InvalidSequence(String),

    #[error("disk cache error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
