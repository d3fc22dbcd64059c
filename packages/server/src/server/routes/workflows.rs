//! Workflow endpoints.
//!
//! Graph validation failures are not errors in the action layer; they come
//! back as `Invalid` results and turn into 422 envelopes here, with the
//! individual problems in the `details` array.

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::common::auth::Permission;
use crate::common::pagination::{Page, PaginationArgs};
use crate::common::{RunId, WorkflowId};
use crate::domains::workflows::actions::{
    activate_workflow, archive_workflow, create_workflow, get_run, get_workflow, list_runs,
    list_workflows, pause_workflow, update_workflow, ActivateWorkflowResult, WorkflowSaveResult,
};
use crate::domains::workflows::data::{
    CreateWorkflowInput, RunDetail, UpdateWorkflowInput, WorkflowDetail,
};
use crate::domains::workflows::models::{RunStatus, Workflow, WorkflowRun, WorkflowStatus};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route(
            "/workflows",
            get(list_workflows_handler).post(create_workflow_handler),
        )
        .route(
            "/workflows/:id",
            get(get_workflow_handler).put(update_workflow_handler),
        )
        .route("/workflows/:id/activate", post(activate_workflow_handler))
        .route("/workflows/:id/pause", post(pause_workflow_handler))
        .route("/workflows/:id/archive", post(archive_workflow_handler))
        .route("/workflows/:id/runs", get(list_runs_handler))
        .route("/workflows/runs/:run_id", get(get_run_handler))
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowListQuery {
    status: Option<WorkflowStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct RunListQuery {
    status: Option<RunStatus>,
}

async fn create_workflow_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(input): Json<CreateWorkflowInput>,
) -> Result<(StatusCode, Json<WorkflowDetail>), ApiError> {
    user.actor()
        .can(Permission::WorkflowsManage)
        .check(state.deps.as_ref())
        .await?;

    match create_workflow(input, user.user_id, &state.deps).await? {
        WorkflowSaveResult::Saved(detail) => Ok((StatusCode::CREATED, Json(detail))),
        WorkflowSaveResult::Invalid(errors) => Err(ApiError::InvalidWorkflow(errors)),
    }
}

async fn list_workflows_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Query(query): Query<WorkflowListQuery>,
    Query(pagination): Query<PaginationArgs>,
) -> Result<Json<Page<Workflow>>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(
        list_workflows(query.status, pagination, &state.deps).await?,
    ))
}

async fn get_workflow_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<WorkflowId>,
) -> Result<Json<WorkflowDetail>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(get_workflow(id, &state.deps).await?))
}

async fn update_workflow_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<WorkflowId>,
    Json(input): Json<UpdateWorkflowInput>,
) -> Result<Json<WorkflowDetail>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsManage)
        .check(state.deps.as_ref())
        .await?;

    match update_workflow(id, input, &state.deps).await? {
        WorkflowSaveResult::Saved(detail) => Ok(Json(detail)),
        WorkflowSaveResult::Invalid(errors) => Err(ApiError::InvalidWorkflow(errors)),
    }
}

async fn activate_workflow_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<WorkflowId>,
) -> Result<Json<Workflow>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsManage)
        .check(state.deps.as_ref())
        .await?;

    match activate_workflow(id, &state.deps).await? {
        ActivateWorkflowResult::Activated(workflow) => Ok(Json(workflow)),
        ActivateWorkflowResult::Invalid(errors) => Err(ApiError::InvalidWorkflow(errors)),
    }
}

async fn pause_workflow_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<WorkflowId>,
) -> Result<Json<Workflow>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsManage)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(pause_workflow(id, &state.deps).await?))
}

async fn archive_workflow_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<WorkflowId>,
) -> Result<Json<Workflow>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsManage)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(archive_workflow(id, &state.deps).await?))
}

async fn list_runs_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<WorkflowId>,
    Query(query): Query<RunListQuery>,
    Query(pagination): Query<PaginationArgs>,
) -> Result<Json<Page<WorkflowRun>>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(
        list_runs(id, query.status, pagination, &state.deps).await?,
    ))
}

async fn get_run_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(run_id): Path<RunId>,
) -> Result<Json<RunDetail>, ApiError> {
    user.actor()
        .can(Permission::WorkflowsView)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(get_run(run_id, &state.deps).await?))
}
