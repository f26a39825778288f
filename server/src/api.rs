//! Route handlers.

use crate::{AppState, error::ApiError};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use licensor_license::{LicenseError, LicenseStatus, NewLicense};
use licensor_types::LicenseId;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Request bodies ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateRequest {
    pub key: String,
    pub site_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub key: String,
    #[serde(default)]
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub status: LicenseStatus,
}

/// Replaces the balance. Signed so negative input reaches validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsRequest {
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxSitesRequest {
    pub max_sites: u32,
}

/// `null` clears the expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryRequest {
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeRequest {
    pub key: String,
    pub amount: u64,
}

// ── Response bodies ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Ack<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ack<T: Serialize>(body: T) -> Json<Ack<T>> {
    Json(Ack { ok: true, body })
}

#[derive(Debug, Serialize)]
struct Empty {}

#[derive(Debug, Serialize)]
struct LicenseBody<T> {
    license: T,
}

#[derive(Debug, Serialize)]
struct Remaining {
    remaining: u64,
}

#[derive(Debug, Serialize)]
struct Unknown {
    ok: bool,
    valid: bool,
    reason: &'static str,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    licenses: usize,
    activations: usize,
}

fn parse_id(raw: &str) -> Result<LicenseId, ApiError> {
    LicenseId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// ── Admin ────────────────────────────────────────────────────────

pub(crate) async fn create_license(
    State(state): State<AppState>,
    body: Result<Json<NewLicense>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(new) = body?;
    let issued = state
        .call("create", move |m| m.create(new.clone()))
        .await?;
    Ok((StatusCode::CREATED, ack(issued)).into_response())
}

pub(crate) async fn list_licenses(State(state): State<AppState>) -> Result<Response, ApiError> {
    let listing = state.call("list", |m| Ok(m.list())).await?;
    Ok(ack(listing).into_response())
}

pub(crate) async fn get_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let details = state.call("get", move |m| m.get(id)).await?;
    Ok(ack(details).into_response())
}

pub(crate) async fn delete_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    state.call("delete", move |m| m.delete(id)).await?;
    Ok(ack(Empty {}).into_response())
}

pub(crate) async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let license = state
        .call("set_status", move |m| m.set_status(id, req.status))
        .await?;
    Ok(ack(LicenseBody { license }).into_response())
}

pub(crate) async fn set_credits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CreditsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let license = state
        .call("set_credits", move |m| m.set_credit_balance(id, req.credits))
        .await?;
    Ok(ack(LicenseBody { license }).into_response())
}

pub(crate) async fn top_up_credits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TopUpRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let license = state
        .call("top_up", move |m| m.add_credits(id, req.amount))
        .await?;
    Ok(ack(LicenseBody { license }).into_response())
}

pub(crate) async fn set_max_sites(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<MaxSitesRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let license = state
        .call("set_max_sites", move |m| m.set_max_sites(id, req.max_sites))
        .await?;
    Ok(ack(LicenseBody { license }).into_response())
}

pub(crate) async fn set_expiry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ExpiryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let license = state
        .call("set_expiry", move |m| m.set_expiry(id, req.expires_at))
        .await?;
    Ok(ack(LicenseBody { license }).into_response())
}

// ── Public ───────────────────────────────────────────────────────

pub(crate) async fn activate(
    State(state): State<AppState>,
    body: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let receipt = state
        .call("activate", move |m| m.activate(&req.key, &req.site_url))
        .await?;
    Ok(ack(receipt).into_response())
}

/// Inactive licenses answer 200 with `ok: false, valid: false` and the
/// reason; an unknown key is reported in the body rather than as a
/// transport error.
pub(crate) async fn validate(
    State(state): State<AppState>,
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let result = state
        .call("validate", move |m| {
            m.validate(&req.key, req.site_url.as_deref())
        })
        .await;

    match result {
        Ok(report) => Ok(Json(Ack {
            ok: report.valid,
            body: report,
        })
        .into_response()),
        Err(ApiError::License(LicenseError::InvalidKey)) => {
            debug!("Validate with unknown key");
            Ok(Json(Unknown {
                ok: false,
                valid: false,
                reason: "invalid_key",
            })
            .into_response())
        }
        Err(e) => Err(e),
    }
}

pub(crate) async fn consume_credits(
    State(state): State<AppState>,
    body: Result<Json<ConsumeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body?;
    let remaining = state
        .call("consume_credits", move |m| {
            m.consume_credits(&req.key, req.amount)
        })
        .await?;
    Ok(ack(Remaining { remaining }).into_response())
}

pub(crate) async fn health(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (licenses, activations) = state
        .call("health", |m| {
            Ok(m.store()
                .read(|book| (book.licenses().count(), book.activations().len())))
        })
        .await?;
    Ok(ack(Health {
        status: "ok",
        licenses,
        activations,
    })
    .into_response())
}
