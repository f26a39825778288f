//! Mapping of manager outcomes onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use licensor_license::LicenseError;
use serde::Serialize;
use tracing::error;

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// A manager outcome other than success.
    License(LicenseError),
    /// Missing or wrong admin credential.
    Unauthorized,
    /// Request could not be decoded.
    BadRequest(String),
    /// The blocking task running the manager call died.
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: &'a str,
    message: String,
}

/// HTTP status for a manager error.
#[must_use]
pub fn status_for(err: &LicenseError) -> StatusCode {
    match err {
        LicenseError::InvalidKey => StatusCode::UNAUTHORIZED,
        LicenseError::Inactive(_) => StatusCode::FORBIDDEN,
        LicenseError::SeatLimitReached { .. } => StatusCode::CONFLICT,
        LicenseError::NotFound(_) => StatusCode::NOT_FOUND,
        LicenseError::Validation(_) => StatusCode::BAD_REQUEST,
        LicenseError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
        LicenseError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        Self::License(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::License(err) => (status_for(err), err.code(), err.to_string()),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "admin credential required".to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Internal(msg) => {
                error!("Request failed internally: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            ok: false,
            error: code,
            message,
        };
        (status, Json(body)).into_response()
    }
}
