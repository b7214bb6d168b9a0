//! The `ActionExecutor` trait: the contract every invocation backend must fulfil.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ActionError;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

/// Invocation method of a task's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether the parameter payload travels in the request body
    /// (as opposed to the query string).
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get    => write!(f, "GET"),
            Self::Post   => write!(f, "POST"),
            Self::Put    => write!(f, "PUT"),
            Self::Patch  => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET"    => Ok(Self::Get),
            "POST"   => Ok(Self::Post),
            "PUT"    => Ok(Self::Put),
            "PATCH"  => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other    => Err(format!("unknown method: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One invocation of a task's action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub method: HttpMethod,
    /// Action identifier; for the HTTP executor this is the target URL.
    pub action: String,
    /// Parameter payload stored on the task definition.
    pub params: Value,
}

/// What the action answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: u16,
    pub body: Value,
}

impl ActionResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Failure statuses worth another attempt: request timeout, rate limiting
    /// and server errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self.status, 408 | 429) || self.status >= 500
    }
}

// ---------------------------------------------------------------------------
// ActionExecutor
// ---------------------------------------------------------------------------

/// The invocation seam between the engine and the outside world.
///
/// Implementations perform exactly one attempt per call; retries are the
/// engine's business.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Invoke the action and return its status code and body.
    ///
    /// A non-2xx status is *not* an error at this level; `Err` means no
    /// response was obtained.
    async fn invoke(&self, request: &ActionRequest) -> Result<ActionResponse, ActionError>;
}
