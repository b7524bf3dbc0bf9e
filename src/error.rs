//! HTTP error surface.
//!
//! Every service has its own `thiserror` enum and implements [`ErrorCode`]
//! for it. Handlers return `Result<_, ApiError>` and use `?`; the conversion
//! maps the service error to a status and a stable snake_case code rendered
//! as `{"error": code}`. Server-side failures are logged here, once, with the
//! underlying message; clients only ever see the code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Stable machine-readable code and HTTP status for a service error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn status(&self) -> StatusCode;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
}

impl ApiError {
    #[must_use]
    pub const fn new(status: StatusCode, code: &'static str) -> Self {
        Self { status, code }
    }

    #[must_use]
    pub const fn bad_request(code: &'static str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }

    #[must_use]
    pub const fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    #[must_use]
    pub const fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden")
    }

    #[must_use]
    pub const fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found")
    }

    #[must_use]
    pub const fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.error_code(), "request failed");
        }
        Self { status, code: err.error_code() }
    }
}

/// Unexpected query failures outside a service enum.
impl ErrorCode for sqlx::Error {
    fn error_code(&self) -> &'static str {
        "internal_error"
    }

    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.code }))).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
