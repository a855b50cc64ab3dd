use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gatehouse_auth_types::identity::IdentityHeaders;
use gatehouse_core::serde::{to_rfc3339_ms, to_rfc3339_ms_opt};

use crate::error::StepUpError;
use crate::state::AppState;
use crate::usecase::send::{SendRouteEmailOtpInput, SendRouteEmailOtpOutput};
use crate::usecase::status::RouteAccessStatus;
use crate::usecase::verify::VerifyRouteEmailOtpOutput;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First hop of `x-forwarded-for`, i.e. the original client as seen by the gateway.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

// ── GET /route-access/{route_key} ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct RouteAccessStatusResponse {
    pub route_key: String,
    pub verified: bool,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub challenge_active: bool,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub challenge_expires_at: Option<DateTime<Utc>>,
    pub remaining_sends_24h: i64,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub resend_available_at: Option<DateTime<Utc>>,
}

impl From<RouteAccessStatus> for RouteAccessStatusResponse {
    fn from(s: RouteAccessStatus) -> Self {
        Self {
            route_key: s.route_key,
            verified: s.verified,
            verification_expires_at: s.verification_expires_at,
            challenge_active: s.challenge_active,
            challenge_expires_at: s.challenge_expires_at,
            remaining_sends_24h: s.remaining_sends_24h,
            resend_available_at: s.resend_available_at,
        }
    }
}

pub async fn get_route_access_status(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(route_key): Path<String>,
) -> Result<Json<RouteAccessStatusResponse>, StepUpError> {
    let status = state
        .engine
        .get_route_access_status_for_user(identity.user_id, &route_key)
        .await?;
    Ok(Json(status.into()))
}

// ── POST /route-access/{route_key}/email-otp ──────────────────────────────────

#[derive(Serialize)]
pub struct SendRouteEmailOtpResponse {
    pub route_key: String,
    pub challenge_id: Uuid,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub challenge_expires_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub resend_available_at: DateTime<Utc>,
    pub remaining_sends_24h: i64,
}

impl From<SendRouteEmailOtpOutput> for SendRouteEmailOtpResponse {
    fn from(o: SendRouteEmailOtpOutput) -> Self {
        Self {
            route_key: o.route_key,
            challenge_id: o.challenge_id,
            challenge_expires_at: o.challenge_expires_at,
            resend_available_at: o.resend_available_at,
            remaining_sends_24h: o.remaining_sends_24h,
        }
    }
}

pub async fn send_route_email_otp(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(route_key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StepUpError> {
    let email = identity
        .user_email
        .ok_or_else(|| StepUpError::BadRequest("user email is required".to_owned()))?;

    let output = state
        .engine
        .send_route_email_otp_for_user(SendRouteEmailOtpInput {
            owner_user_id: identity.user_id,
            email,
            route_key,
            ip_address: client_ip(&headers),
            user_agent: user_agent(&headers),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendRouteEmailOtpResponse::from(output)),
    ))
}

// ── POST /route-access/{route_key}/email-otp/verify ───────────────────────────

#[derive(Deserialize)]
pub struct VerifyRouteEmailOtpRequest {
    pub code: String,
}

/// A body that is not `{ "code": "<string>" }` is answered like a wrong code.
fn submitted_code(
    body: Result<Json<VerifyRouteEmailOtpRequest>, JsonRejection>,
) -> Result<String, StepUpError> {
    body.map(|Json(body)| body.code)
        .map_err(|_| StepUpError::InvalidOrExpired)
}

#[derive(Serialize)]
pub struct VerifyRouteEmailOtpResponse {
    pub route_key: String,
    pub verified: bool,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub verification_expires_at: DateTime<Utc>,
}

impl From<VerifyRouteEmailOtpOutput> for VerifyRouteEmailOtpResponse {
    fn from(o: VerifyRouteEmailOtpOutput) -> Self {
        Self {
            route_key: o.route_key,
            verified: o.verified,
            verification_expires_at: o.verification_expires_at,
        }
    }
}

pub async fn verify_route_email_otp(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(route_key): Path<String>,
    body: Result<Json<VerifyRouteEmailOtpRequest>, JsonRejection>,
) -> Result<Json<VerifyRouteEmailOtpResponse>, StepUpError> {
    let code = submitted_code(body)?;
    let output = state
        .engine
        .verify_route_email_otp_for_user(identity.user_id, &route_key, &code)
        .await?;
    Ok(Json(output.into()))
}

// ── GET /route-access/{route_key}/assert ──────────────────────────────────────

/// Guard endpoint for protected handlers: 204 when a grant is in force.
pub async fn assert_route_access(
    State(state): State<AppState>,
    identity: IdentityHeaders,
    Path(route_key): Path<String>,
) -> Result<StatusCode, StepUpError> {
    state
        .engine
        .assert_route_access_for_user(identity.user_id, &route_key)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
