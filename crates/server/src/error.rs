use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mailquote_core::errors::{ApplicationError, DomainError};
use mailquote_db::RepositoryError;
use serde::Serialize;
use tracing::error;

/// Failure envelope shared by every endpoint: `{ "success": false, "error": ... }`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    inner: ApplicationError,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bad_request(message: impl Into<String>) -> Response {
        (StatusCode::BAD_REQUEST, Json(ErrorEnvelope::new(message))).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(inner: ApplicationError) -> Self {
        let status = match &inner {
            ApplicationError::Domain(DomainError::AlreadyFinalized { .. }) => StatusCode::CONFLICT,
            ApplicationError::Domain(DomainError::InvariantViolation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApplicationError::NotFound(_) => StatusCode::NOT_FOUND,
            ApplicationError::Integration(_) => StatusCode::BAD_GATEWAY,
            ApplicationError::Persistence(_) | ApplicationError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self { status, inner }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                event_name = "server.request_failed",
                status = status.as_u16(),
                error = %self.inner,
                "request failed"
            );
        }
        (status, Json(ErrorEnvelope::new(self.inner.user_message()))).into_response()
    }
}
