//! Mapping from engine errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use engine::EngineError;

/// Error returned by every handler; rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Cycle(_)
            | EngineError::DependencyNotReady(_)
            | EngineError::AlreadyRunning(_) => StatusCode::CONFLICT,
            EngineError::Dispatch { .. }
            | EngineError::Cancelled
            | EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %err, "request failed");
        }

        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let cases = [
            (EngineError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                EngineError::NotFound { entity: "node", id: "x".into() },
                StatusCode::NOT_FOUND,
            ),
            (EngineError::Cycle(Uuid::nil()), StatusCode::CONFLICT),
            (EngineError::DependencyNotReady(vec![Uuid::nil()]), StatusCode::CONFLICT),
            (EngineError::AlreadyRunning(Uuid::nil()), StatusCode::CONFLICT),
            (EngineError::Cancelled, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
