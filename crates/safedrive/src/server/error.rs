//! Failure envelope for HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::Error;

/// A failed request, rendered as `{ success: false, error }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    success: bool,
    error: &'a str,
}

impl ApiError {
    /// Create a failure with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A request body that could not be decoded.
    #[must_use]
    pub fn invalid_json(rejection: &JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection);
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }

    /// The status this failure is sent with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = FailureBody {
            success: false,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
