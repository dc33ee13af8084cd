//! Error model for authorization and approval flows.

use thiserror::Error;

/// Result type used across the authorization/approval core.
pub type AccessResult<T> = Result<T, AccessError>;

/// Failure surfaced to callers of the authorization/approval core.
///
/// Keep this focused on deterministic decision and state-machine failures.
/// Store-specific errors live next to their stores and are converted at the
/// service boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No actor identity (unauthenticated caller).
    #[error("unauthorized")]
    Unauthorized,

    /// Actor identified but lacks the required permission.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A state transition was attempted from a non-expected state
    /// (a concurrent decision already applied).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A required input was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist.
    #[error("not found")]
    NotFound,

    /// The durable store was unreachable. Permission checks resolve this as
    /// deny, never fail-open.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// An action handler reported failure. Recorded on the approval request's
    /// terminal state, not retried automatically.
    #[error("execution failed: {0}")]
    ExecutionFailure(String),
}

impl AccessError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn execution_failure(msg: impl Into<String>) -> Self {
        Self::ExecutionFailure(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
