//! Error types for the Pactum reconciliation engine.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using the engine's [`ReconError`].
pub type Result<T> = std::result::Result<T, ReconError>;

/// Errors that can occur during contract reconciliation.
///
/// The taxonomy distinguishes non-retryable input errors from transient
/// adapter/repository failures (retried with backoff) and permanent adapter
/// failures (retried once to tolerate flakes, then degraded).
#[derive(Error, Debug)]
pub enum ReconError {
    /// Missing document, unknown tenant, malformed term. Never retried.
    #[error("input error: {0}")]
    Input(String),

    /// Network failure, 5xx, rate limit. Retried with backoff.
    #[error("transient adapter failure ({provider}): {message}")]
    AdapterTransient { provider: String, message: String },

    /// Schema mismatch, auth failure. Retried once, then degraded.
    #[error("permanent adapter failure ({provider}): {message}")]
    AdapterPermanent { provider: String, message: String },

    /// Compare-and-swap reject on a match-result upsert.
    #[error(
        "version conflict on clause {clause_id}: candidate {candidate} <= current {current}"
    )]
    VersionConflict {
        clause_id: Uuid,
        candidate: u32,
        current: u32,
    },

    /// Repository failure. Retryable iff the backend reported it as such.
    #[error("repository error: {message}")]
    Repository { message: String, retryable: bool },

    /// An adapter call exceeded its deadline.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Embedding dimensionality disagreement between two vectors.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReconError {
    /// Creates an input error.
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Creates a transient adapter error.
    pub fn adapter_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterTransient {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a permanent adapter error.
    pub fn adapter_permanent(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterPermanent {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a retryable repository error.
    pub fn repository_transient(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable repository error.
    pub fn repository_permanent(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the retry ladder should re-attempt this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AdapterTransient { .. }
                | Self::Timeout { .. }
                | Self::Repository {
                    retryable: true,
                    ..
                }
        )
    }
}
