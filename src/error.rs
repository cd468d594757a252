//! Error types shared by the planner, the store and the task cache.

use std::time::Duration;
use thiserror::Error;

/// Why a solver could not produce a tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// The dynamic program found no finite-cost path.
    #[error("no feasible tour exists")]
    Infeasible,
    /// The time budget expired before a complete tour was built.
    #[error("time budget exhausted before a tour was found")]
    TimedOut,
}

/// Errors returned by route planning and daily task assignment.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Empty or malformed input: point sets, matrices, cluster counts,
    /// configuration values or status transitions.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A lock on shared state could not be acquired in time.
    #[error("lock acquisition timed out on {resource} after {timeout:?}")]
    LockTimeout {
        resource: &'static str,
        timeout: Duration,
    },

    /// A solver did not return a usable tour.
    #[error("solver failure: {0}")]
    SolverFailure(FailureKind),

    /// A referenced courier, order, package or delivery does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlanError {
    /// Shorthand for [`PlanError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        PlanError::InvalidInput(message.into())
    }

    /// Shorthand for [`PlanError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PlanError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlanError::LockTimeout { .. } | PlanError::SolverFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
