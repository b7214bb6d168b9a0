//! Action-level error type.

use thiserror::Error;

/// Errors returned by [`ActionExecutor::invoke`](crate::ActionExecutor::invoke)
/// when no response could be obtained at all.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable`: the invocation may be attempted again after a back-off.
/// - `Fatal`: the task is failed immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Transient failure (connection refused, timeout, …).
    #[error("retryable action error: {0}")]
    Retryable(String),

    /// Permanent failure (malformed action, unsupported payload, …).
    #[error("fatal action error: {0}")]
    Fatal(String),
}

impl ActionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
