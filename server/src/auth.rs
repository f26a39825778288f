//! Admin credential check for mutating and listing routes.

use crate::{AppState, error::ApiError};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Rejects the request unless it carries `Authorization: Bearer <admin token>`.
pub(crate) async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| tokens_match(token.trim(), &state.admin_token));

    if !authorized {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

// Compares fixed-length digests, never the raw tokens.
fn tokens_match(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}
