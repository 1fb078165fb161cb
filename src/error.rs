//! Error types for the memory core.
//!
//! Storage-layer kinds (`NotFound`, `ConstraintViolation`) are returned
//! directly to Graph Store callers. `RetrievalUnavailable` is recovered inside
//! a SIFT round; `DeadlineExceeded` ends a query with partial results.

use thiserror::Error;

use crate::sources::SourceCategory;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("retrieval unavailable for {category}: {reason}")]
    RetrievalUnavailable {
        category: SourceCategory,
        reason: String,
    },
    #[error("deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// Build an `InvariantViolation`, logging it at error level first.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "invariant violation");
        Self::InvariantViolation(message)
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;
