//! Error types for the turn orchestrator.
//!
//! The taxonomy mirrors the failure domains of the control plane: provider
//! task failures are isolated and retryable, evaluator failures abort the
//! critic loop, and only a synthesis hard failure ever reaches the user.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the orchestrator crates.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors produced by the orchestration control plane.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A context provider task failed.
    #[error("provider '{provider}' failed: {message}")]
    Provider {
        /// Provider identity that failed.
        provider: String,
        /// Human-readable failure description.
        message: String,
        /// Whether the failure is transient and worth retrying.
        retryable: bool,
    },

    /// An external call exceeded its latency budget.
    #[error("operation timed out after {elapsed:?}")]
    Timeout {
        /// Time spent before the deadline fired.
        elapsed: Duration,
    },

    /// The generation client failed.
    #[error("generation call failed: {message}")]
    Generation {
        /// Human-readable failure description.
        message: String,
        /// Whether the failure is transient and worth retrying.
        retryable: bool,
    },

    /// The critic evaluator failed or returned an unusable assessment.
    #[error("evaluator failed: {message}")]
    Evaluator {
        /// Human-readable failure description.
        message: String,
    },

    /// A task graph violated a structural invariant.
    #[error("invalid task graph: {message}")]
    InvalidGraph {
        /// Which invariant was violated.
        message: String,
    },

    /// Serialization or deserialization failed at a boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },
}

impl OrchestratorError {
    /// Create a provider failure.
    #[must_use]
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Create a generation failure.
    #[must_use]
    pub fn generation(message: impl Into<String>, retryable: bool) -> Self {
        Self::Generation {
            message: message.into(),
            retryable,
        }
    }

    /// Create an evaluator failure.
    #[must_use]
    pub fn evaluator(message: impl Into<String>) -> Self {
        Self::Evaluator {
            message: message.into(),
        }
    }

    /// Create a graph invariant violation.
    #[must_use]
    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } | Self::Generation { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            Self::Evaluator { .. }
            | Self::InvalidGraph { .. }
            | Self::Serialization(_)
            | Self::Internal { .. } => false,
        }
    }
}
