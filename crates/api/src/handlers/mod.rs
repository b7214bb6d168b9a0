pub mod executions;
pub mod nodes;
pub mod tasks;
pub mod workflows;

/// Result type shared by every handler.
pub type ApiResult<T> = Result<T, crate::error::ApiError>;
