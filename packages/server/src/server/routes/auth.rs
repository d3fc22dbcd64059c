//! Passwordless login endpoints.
//!
//! These are the only routes besides the webhooks that accept anonymous
//! callers, so app.rs additionally wraps them in the per-IP rate limiter.

use axum::{extract::Extension, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::domains::auth::actions::{
    request_otp, resend_otp, verify_otp, RequestOtpResult, ResendOtpResult, VerifyOtpResult,
};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::ClientIp;

pub fn routes() -> Router {
    Router::new()
        .route("/auth/otp/request", post(request_otp_handler))
        .route("/auth/otp/resend", post(resend_otp_handler))
        .route("/auth/otp/verify", post(verify_otp_handler))
}

#[derive(Debug, Deserialize)]
struct OtpRequestBody {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct OtpVerifyBody {
    identifier: String,
    code: String,
}

async fn request_otp_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    Json(body): Json<OtpRequestBody>,
) -> Result<Json<Value>, ApiError> {
    if let Some(Extension(ClientIp(ip))) = client_ip {
        debug!(%ip, "login code requested");
    }
    match request_otp(body.identifier, &state.deps).await? {
        RequestOtpResult::Sent => Ok(Json(json!({ "status": "sent" }))),
        RequestOtpResult::NotRegistered => Err(ApiError::NotRegistered),
    }
}

async fn resend_otp_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<OtpRequestBody>,
) -> Result<Json<Value>, ApiError> {
    match resend_otp(body.identifier, &state.deps).await? {
        ResendOtpResult::Sent => Ok(Json(json!({ "status": "sent" }))),
        ResendOtpResult::NotRegistered => Err(ApiError::NotRegistered),
        ResendOtpResult::CooldownActive { retry_in_seconds } => {
            Err(ApiError::CooldownActive(retry_in_seconds))
        }
        ResendOtpResult::ResendLimitReached => Err(ApiError::ResendLimitReached),
    }
}

async fn verify_otp_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    Json(body): Json<OtpVerifyBody>,
) -> Result<Json<Value>, ApiError> {
    let result = verify_otp(body.identifier, body.code, &state.deps).await?;
    if !matches!(&result, VerifyOtpResult::Verified { .. }) {
        if let Some(Extension(ClientIp(ip))) = client_ip {
            warn!(%ip, "failed login code attempt");
        }
    }
    match result {
        VerifyOtpResult::Verified { token, user } => {
            Ok(Json(json!({ "token": token, "user": user })))
        }
        VerifyOtpResult::InvalidCode => Err(ApiError::InvalidCode),
        VerifyOtpResult::LockedOut => Err(ApiError::LockedOut),
    }
}
