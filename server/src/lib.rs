//! HTTP API for Licensor.
//!
//! Translates JSON requests into [`LicenseManager`] calls and manager
//! outcomes into responses with a fixed status-code mapping (see
//! [`status_for`]). Admin routes sit behind a bearer-token check; the
//! activation, validation and metering routes are called by client
//! installations with their license key.

mod api;
mod auth;
mod error;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::{Router, middleware};
use licensor_license::{LicenseManager, LicenseResult};
use tracing::warn;

pub use api::{
    ActivateRequest, ConsumeRequest, CreditsRequest, ExpiryRequest, MaxSitesRequest,
    StatusRequest, TopUpRequest, ValidateRequest,
};
pub use error::{ApiError, status_for};

/// Default number of attempts for a call that hit a persistence failure.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Upper bound on configurable attempts.
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    manager: Arc<LicenseManager>,
    admin_token: Arc<str>,
    retry_attempts: u32,
}

impl AppState {
    /// Creates handler state around a manager and the admin bearer token.
    pub fn new(manager: LicenseManager, admin_token: impl Into<Arc<str>>) -> Self {
        Self {
            manager: Arc::new(manager),
            admin_token: admin_token.into(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Sets how many times a persistence failure is attempted (1..=5).
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.clamp(1, MAX_RETRY_ATTEMPTS);
        self
    }

    /// Runs a manager call on the blocking pool.
    ///
    /// Persistence failures are retried with a short linear backoff until
    /// the attempt budget is spent; every other outcome returns at once.
    pub(crate) async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T, ApiError>
    where
        F: Fn(&LicenseManager) -> LicenseResult<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let f = Arc::new(f);
        let mut attempt = 1;
        loop {
            let manager = Arc::clone(&self.manager);
            let task = Arc::clone(&f);
            let result = tokio::task::spawn_blocking(move || (*task)(&manager))
                .await
                .map_err(|e| ApiError::Internal(format!("{op} task failed: {e}")))?;

            match result {
                Err(e) if e.is_retryable() && attempt < self.retry_attempts => {
                    warn!(op, attempt, "Persistence failure, retrying: {}", e);
                    tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(op, attempt, "Persistence failure, giving up: {}", e);
                    }
                    return Err(e.into());
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/api/v1/licenses",
            post(api::create_license).get(api::list_licenses),
        )
        .route(
            "/api/v1/licenses/{id}",
            get(api::get_license).delete(api::delete_license),
        )
        .route("/api/v1/licenses/{id}/status", put(api::set_status))
        .route("/api/v1/licenses/{id}/credits", put(api::set_credits))
        .route("/api/v1/licenses/{id}/credits/top-up", post(api::top_up_credits))
        .route("/api/v1/licenses/{id}/max-sites", put(api::set_max_sites))
        .route("/api/v1/licenses/{id}/expiry", put(api::set_expiry))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let public = Router::new()
        .route("/api/v1/activate", post(api::activate))
        .route("/api/v1/validate", post(api::validate))
        .route("/api/v1/credits/consume", post(api::consume_credits))
        .route("/healthz", get(api::health));

    admin.merge(public).with_state(state)
}
