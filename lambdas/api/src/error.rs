use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] domain::Error),

    #[error("Invalid request body: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use domain::Error;

        let (status, code, message) = match self {
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION",
                format!("Invalid request body: {detail}"),
            ),
            ApiError::Domain(err) => match err {
                Error::Validation { message } => (StatusCode::BAD_REQUEST, "VALIDATION", message),
                Error::InvalidStateTransition { from, to } => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_STATE",
                    format!("Prescription cannot move from {from} to {to}"),
                ),
                Error::Unauthorized => (
                    StatusCode::UNAUTHORIZED,
                    "AUTH_REQUIRED",
                    "Authentication required".to_string(),
                ),
                Error::Forbidden => (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Not authorized to perform this action".to_string(),
                ),
                Error::NotFound { entity } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                Error::Uniqueness { .. } | Error::Conflict { .. } => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    "Record was modified concurrently, retry the request".to_string(),
                ),
                Error::Storage { message } => {
                    tracing::error!("Storage error: {}", message);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL",
                        "An internal error occurred".to_string(),
                    )
                }
            },
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}
