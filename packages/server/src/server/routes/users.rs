//! User management endpoints.
//!
//! Listing and reading users only needs a signed-in caller (lead assignment
//! pickers need the roster); creating and editing accounts needs
//! `users.manage`.

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::common::auth::Permission;
use crate::common::pagination::{Page, PaginationArgs};
use crate::common::UserId;
use crate::domains::users::actions::{create_user, get_user, list_users, update_user};
use crate::domains::users::data::{CreateUserInput, UpdateUserInput};
use crate::domains::users::models::{User, UserFilter};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route("/users/me", get(current_user_handler))
        .route(
            "/users/:id",
            get(get_user_handler).patch(update_user_handler),
        )
}

async fn create_user_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    user.actor()
        .can(Permission::UsersManage)
        .check(state.deps.as_ref())
        .await?;

    let created = create_user(input, &state.deps).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_users_handler(
    Extension(state): Extension<AppState>,
    _user: AuthUser,
    Query(filter): Query<UserFilter>,
    Query(pagination): Query<PaginationArgs>,
) -> Result<Json<Page<User>>, ApiError> {
    Ok(Json(list_users(filter, pagination, &state.deps).await?))
}

async fn current_user_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> Result<Json<User>, ApiError> {
    Ok(Json(get_user(user.user_id, &state.deps).await?))
}

async fn get_user_handler(
    Extension(state): Extension<AppState>,
    _user: AuthUser,
    Path(id): Path<UserId>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(get_user(id, &state.deps).await?))
}

async fn update_user_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<UserId>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    user.actor()
        .can(Permission::UsersManage)
        .check(state.deps.as_ref())
        .await?;

    Ok(Json(update_user(id, input, &state.deps).await?))
}
