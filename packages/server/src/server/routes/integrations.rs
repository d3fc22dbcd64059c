//! Integration endpoints plus the Facebook webhook.
//!
//! The OAuth callback and both webhook routes are public: the callback is a
//! browser redirect that carries no JWT (the single-use state nonce is its
//! authentication), and webhook deliveries authenticate with the
//! `X-Hub-Signature-256` HMAC instead.

use axum::body::Bytes;
use axum::extract::{Extension, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::auth::Permission;
use crate::domains::integrations::actions::{
    disconnect_facebook, facebook_connect_url, facebook_oauth_callback, list_integrations,
    receive_leadgen, verify_subscription, LeadgenWebhookResult,
};
use crate::domains::integrations::data::IntegrationSummary;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/integrations", get(list_integrations_handler))
        .route(
            "/integrations/facebook/oauth/url",
            get(facebook_oauth_url_handler),
        )
        .route(
            "/integrations/facebook/oauth/callback",
            get(facebook_oauth_callback_handler),
        )
        .route(
            "/integrations/facebook",
            axum::routing::delete(disconnect_facebook_handler),
        )
        .route(
            "/webhooks/facebook",
            get(webhook_verify_handler).post(webhook_leadgen_handler),
        )
}

async fn list_integrations_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<IntegrationSummary>>, ApiError> {
    user.actor()
        .can(Permission::IntegrationsManage)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(list_integrations(&state.deps).await?))
}

async fn facebook_oauth_url_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    user.actor()
        .can(Permission::IntegrationsManage)
        .check(state.deps.as_ref())
        .await?;

    let url = facebook_connect_url(&state.deps).await;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
struct OAuthCallbackQuery {
    code: String,
    state: String,
}

async fn facebook_oauth_callback_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Json<IntegrationSummary>, ApiError> {
    let integration = facebook_oauth_callback(&query.code, &query.state, &state.deps).await?;
    Ok(Json(IntegrationSummary::from_integration(&integration)))
}

async fn disconnect_facebook_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<IntegrationSummary>, ApiError> {
    user.actor()
        .can(Permission::IntegrationsManage)
        .check(state.deps.as_ref())
        .await?;

    let integration = disconnect_facebook(&state.deps).await?;
    Ok(Json(IntegrationSummary::from_integration(&integration)))
}

/// Facebook's subscription handshake uses dotted query parameter names.
#[derive(Debug, Deserialize)]
struct HubChallengeQuery {
    #[serde(rename = "hub.mode", default)]
    mode: String,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: String,
    #[serde(rename = "hub.challenge", default)]
    challenge: String,
}

/// `GET /webhooks/facebook`: echo the challenge when the verify token
/// matches, 403 otherwise. The body is plain text, not JSON.
async fn webhook_verify_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<HubChallengeQuery>,
) -> Result<String, ApiError> {
    verify_subscription(&query.mode, &query.verify_token, query.challenge, &state.deps)
        .ok_or_else(|| ApiError::Forbidden("Webhook verification failed".to_string()))
}

/// `POST /webhooks/facebook`: verify the HMAC over the raw bytes, enqueue
/// one import job per leadgen change, answer fast.
async fn webhook_leadgen_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());

    match receive_leadgen(&body, signature, &state.deps).await? {
        LeadgenWebhookResult::Accepted { enqueued } => {
            Ok((StatusCode::OK, Json(json!({ "received": enqueued }))))
        }
        LeadgenWebhookResult::InvalidSignature => {
            Err(ApiError::Forbidden("Invalid webhook signature".to_string()))
        }
    }
}
