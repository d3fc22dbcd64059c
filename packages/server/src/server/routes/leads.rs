//! Lead endpoints.
//!
//! Reads need `leads.view`; writes need `leads.manage` except assignment,
//! which has its own `leads.assign` so dispatchers can route leads without
//! being able to edit them.

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::common::auth::Permission;
use crate::common::pagination::{Page, PaginationArgs};
use crate::common::LeadId;
use crate::domains::leads::actions::{
    add_note, assign_lead, change_lead_status, create_lead, delete_lead, get_lead,
    list_activities, list_leads, update_lead,
};
use crate::domains::leads::data::{
    AddNoteInput, AssignLeadInput, ChangeStatusInput, CreateLeadInput, UpdateLeadInput,
};
use crate::domains::leads::models::{Lead, LeadActivity, LeadFilter};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/leads", get(list_leads_handler).post(create_lead_handler))
        .route(
            "/leads/:id",
            get(get_lead_handler)
                .patch(update_lead_handler)
                .delete(delete_lead_handler),
        )
        .route("/leads/:id/status", post(change_status_handler))
        .route("/leads/:id/assign", post(assign_lead_handler))
        .route("/leads/:id/notes", post(add_note_handler))
        .route("/leads/:id/activities", get(list_activities_handler))
}

async fn create_lead_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(input): Json<CreateLeadInput>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    user.actor()
        .can(Permission::LeadsManage)
        .check(state.deps.as_ref())
        .await?;

    let lead = create_lead(input, Some(user.user_id), &state.deps).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn list_leads_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Query(filter): Query<LeadFilter>,
    Query(pagination): Query<PaginationArgs>,
) -> Result<Json<Page<Lead>>, ApiError> {
    user.actor()
        .can(Permission::LeadsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(list_leads(filter, pagination, &state.deps).await?))
}

async fn get_lead_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
) -> Result<Json<Lead>, ApiError> {
    user.actor()
        .can(Permission::LeadsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(get_lead(id, &state.deps).await?))
}

async fn update_lead_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
    Json(input): Json<UpdateLeadInput>,
) -> Result<Json<Lead>, ApiError> {
    user.actor()
        .can(Permission::LeadsManage)
        .check(state.deps.as_ref())
        .await?;

    let lead = update_lead(id, input, Some(user.user_id), &state.deps).await?;
    Ok(Json(lead))
}

async fn delete_lead_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
) -> Result<StatusCode, ApiError> {
    user.actor()
        .can(Permission::LeadsManage)
        .check(state.deps.as_ref())
        .await?;

    delete_lead(id, &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
    Json(input): Json<ChangeStatusInput>,
) -> Result<Json<Lead>, ApiError> {
    user.actor()
        .can(Permission::LeadsManage)
        .check(state.deps.as_ref())
        .await?;

    let lead = change_lead_status(id, input.status, Some(user.user_id), &state.deps).await?;
    Ok(Json(lead))
}

async fn assign_lead_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
    Json(input): Json<AssignLeadInput>,
) -> Result<Json<Lead>, ApiError> {
    user.actor()
        .can(Permission::LeadsAssign)
        .check(state.deps.as_ref())
        .await?;

    let lead = assign_lead(id, input.owner_id, Some(user.user_id), &state.deps).await?;
    Ok(Json(lead))
}

async fn add_note_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
    Json(input): Json<AddNoteInput>,
) -> Result<(StatusCode, Json<LeadActivity>), ApiError> {
    user.actor()
        .can(Permission::LeadsManage)
        .check(state.deps.as_ref())
        .await?;

    let activity = add_note(id, input.note, Some(user.user_id), &state.deps).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn list_activities_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<LeadId>,
    Query(pagination): Query<PaginationArgs>,
) -> Result<Json<Page<LeadActivity>>, ApiError> {
    user.actor()
        .can(Permission::LeadsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(list_activities(id, pagination, &state.deps).await?))
}
