//! The `ApiError` -> HTTP response mapping. Every fallible path through the
//! orchestrator funnels into one of these variants so the client always
//! sees the same error shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use openbridge_core::models::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("no response found for id")]
    NotFound,

    #[error("state persistence is disabled on this server")]
    StateDisabled,

    #[error("upstream returned an error: {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream returned no usable output: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status_and_kind().0
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "authentication_error"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "invalid_request_error"),
            ApiError::StateDisabled => (StatusCode::NOT_IMPLEMENTED, "invalid_request_error"),
            ApiError::Upstream { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                kind_for_status(*status),
            ),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "server_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }
}

/// Maps an upstream HTTP status onto the client-facing error taxonomy.
fn kind_for_status(status: u16) -> &'static str {
    match status {
        401 | 403 => "authentication_error",
        404 | 422 => "invalid_request_error",
        429 => "rate_limit_error",
        400..=499 => "invalid_request_error",
        _ => "server_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = ErrorResponse::new(kind, self.to_string());
        (status, Json(body)).into_response()
    }
}
