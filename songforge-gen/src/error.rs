//! Error types for the generation orchestration service
//!
//! Ports never swallow errors: adapters convert transport faults into one of
//! these variants and the orchestrator decides state transitions, then
//! re-surfaces the original error to its caller.

use crate::models::SongStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for generation service operations
pub type GenResult<T> = std::result::Result<T, GenError>;

/// Generation service error
///
/// There is intentionally no "unsupported generation type" variant:
/// `GenerationType` is a closed enum and every dispatch over it is an
/// exhaustive `match`.
#[derive(Debug, Error)]
pub enum GenError {
    /// Request fields do not match the requested generation mode.
    /// Surfaced to the submitting caller before any side effect.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Unknown song id on `process` - logged, not retried
    #[error("Song not found: {0}")]
    NotFound(Uuid),

    /// State machine violation; benign on queue redelivery
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: SongStatus, to: SongStatus },

    /// Database unreachable, constraint violation, or corrupt row
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Object storage transport failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Non-success response (or timeout) from the AI generation backend.
    /// `status` is `None` when the request never produced a response.
    #[error("Generation backend error ({}): {message}", status_label(.status))]
    Backend { status: Option<u16>, message: String },

    /// Configuration / IO fault from the common layer
    #[error(transparent)]
    Common(#[from] songforge_common::Error),
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "transport".to_string(),
    }
}

impl From<sqlx::Error> for GenError {
    fn from(e: sqlx::Error) -> Self {
        GenError::Persistence(e.to_string())
    }
}

impl From<object_store::Error> for GenError {
    fn from(e: object_store::Error) -> Self {
        GenError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        // Timeouts are treated identically to backend errors: terminal for
        // this attempt, retried only through queue redelivery.
        GenError::Backend {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl GenError {
    /// Whether the queue may redeliver the job after this error.
    ///
    /// Backend responses (including timeouts) are terminal for the attempt -
    /// the song has already been moved to `Failed`. Persistence and storage
    /// faults happen before any terminal transition, so redelivery can
    /// make progress.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenError::Persistence(_) | GenError::Storage(_))
    }

    /// Errors a redelivered job may legitimately run into; the worker
    /// completes the job instead of crashing or requeueing.
    pub fn is_benign_redelivery(&self) -> bool {
        matches!(
            self,
            GenError::NotFound(_) | GenError::InvalidTransition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_is_not_retryable() {
        let err = GenError::Backend {
            status: Some(500),
            message: "model OOM".into(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_transport_error_formats_without_status() {
        let err = GenError::Backend {
            status: None,
            message: "connection refused".into(),
        };
        assert!(err.to_string().contains("transport"));
    }

    #[test]
    fn test_persistence_error_is_retryable() {
        assert!(GenError::Persistence("database is locked".into()).is_retryable());
    }

    #[test]
    fn test_redelivery_classification() {
        assert!(GenError::NotFound(Uuid::new_v4()).is_benign_redelivery());
        assert!(GenError::InvalidTransition {
            from: SongStatus::Completed,
            to: SongStatus::Processing,
        }
        .is_benign_redelivery());
        assert!(!GenError::Validation("missing lyrics".into()).is_benign_redelivery());
    }
}
