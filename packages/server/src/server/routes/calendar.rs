//! Calendar endpoints.
//!
//! The Google connection is one integration row; events are never stored
//! locally, every read goes to the calendar API with a token the action
//! layer refreshes on demand. The OAuth callback is public for the same
//! reason the Facebook one is: the redirect carries no JWT.

use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::auth::Permission;
use crate::domains::calendar::actions::{
    calendar_status, create_event_for_lead, disconnect_google, google_connect_url,
    google_oauth_callback, list_upcoming_events,
};
use crate::domains::calendar::data::CreateEventInput;
use crate::domains::integrations::data::IntegrationSummary;
use crate::kernel::google_client::CalendarEvent;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/calendar/oauth/url", get(google_oauth_url_handler))
        .route("/calendar/oauth/callback", get(google_oauth_callback_handler))
        .route("/calendar/status", get(calendar_status_handler))
        .route("/calendar", axum::routing::delete(disconnect_google_handler))
        .route(
            "/calendar/events",
            get(list_events_handler).post(create_event_handler),
        )
}

async fn google_oauth_url_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    user.actor()
        .can(Permission::CalendarManage)
        .check(state.deps.as_ref())
        .await?;

    let url = google_connect_url(&state.deps).await;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
struct OAuthCallbackQuery {
    code: String,
    state: String,
}

async fn google_oauth_callback_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Json<IntegrationSummary>, ApiError> {
    let integration = google_oauth_callback(&query.code, &query.state, &state.deps).await?;
    Ok(Json(IntegrationSummary::from_integration(&integration)))
}

async fn calendar_status_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<IntegrationSummary>, ApiError> {
    user.actor()
        .can(Permission::CalendarManage)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(calendar_status(&state.deps).await?))
}

async fn disconnect_google_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<IntegrationSummary>, ApiError> {
    user.actor()
        .can(Permission::CalendarManage)
        .check(state.deps.as_ref())
        .await?;

    let integration = disconnect_google(&state.deps).await?;
    Ok(Json(IntegrationSummary::from_integration(&integration)))
}

async fn create_event_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(input): Json<CreateEventInput>,
) -> Result<(StatusCode, Json<CalendarEvent>), ApiError> {
    user.actor()
        .can(Permission::CalendarManage)
        .check(state.deps.as_ref())
        .await?;

    let event = create_event_for_lead(input, Some(user.user_id), &state.deps).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
struct ListEventsQuery {
    max: Option<u32>,
}

async fn list_events_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<CalendarEvent>>, ApiError> {
    user.actor()
        .can(Permission::CalendarManage)
        .check(state.deps.as_ref())
        .await?;

    let events = list_upcoming_events(query.max.unwrap_or(10), &state.deps).await?;
    Ok(Json(events))
}
