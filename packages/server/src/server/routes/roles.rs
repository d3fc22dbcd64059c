//! Role and permission endpoints.
//!
//! The permission catalog is fixed (seeded by migrations); roles bundle a
//! subset of it. Reading either only needs a signed-in caller, since the
//! user editor has to show role names. Mutations need `roles.manage`.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::common::auth::Permission as PermissionKey;
use crate::common::RoleId;
use crate::domains::rbac::actions::{
    create_role, delete_role, sync_role_permissions, update_role,
};
use crate::domains::rbac::models::{Permission, Role};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/permissions", get(list_permissions_handler))
        .route("/roles", get(list_roles_handler).post(create_role_handler))
        .route(
            "/roles/:id",
            axum::routing::patch(update_role_handler).delete(delete_role_handler),
        )
        .route("/roles/:id/permissions", put(sync_permissions_handler))
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SyncPermissionsBody {
    permissions: Vec<String>,
}

/// A role with its permission keys inlined.
#[derive(Debug, Serialize)]
struct RoleWithPermissions {
    #[serde(flatten)]
    role: Role,
    permissions: Vec<String>,
}

async fn list_permissions_handler(
    Extension(state): Extension<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Permission>>, ApiError> {
    Ok(Json(Permission::list(&state.deps.db_pool).await?))
}

async fn list_roles_handler(
    Extension(state): Extension<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<RoleWithPermissions>>, ApiError> {
    let roles = Role::list(&state.deps.db_pool).await?;

    let mut out = Vec::with_capacity(roles.len());
    for role in roles {
        let permissions = Role::permission_keys(role.id, &state.deps.db_pool).await?;
        out.push(RoleWithPermissions { role, permissions });
    }

    Ok(Json(out))
}

async fn create_role_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Json(body): Json<RoleBody>,
) -> Result<(StatusCode, Json<Role>), ApiError> {
    user.actor()
        .can(PermissionKey::RolesManage)
        .check(state.deps.as_ref())
        .await?;

    let role = create_role(body.name, body.description, &state.deps).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn update_role_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<RoleId>,
    Json(body): Json<RoleBody>,
) -> Result<Json<Role>, ApiError> {
    user.actor()
        .can(PermissionKey::RolesManage)
        .check(state.deps.as_ref())
        .await?;

    let role = update_role(id, body.name, body.description, &state.deps).await?;
    Ok(Json(role))
}

async fn delete_role_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<RoleId>,
) -> Result<StatusCode, ApiError> {
    user.actor()
        .can(PermissionKey::RolesManage)
        .check(state.deps.as_ref())
        .await?;

    delete_role(id, &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_permissions_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<RoleId>,
    Json(body): Json<SyncPermissionsBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.actor()
        .can(PermissionKey::RolesManage)
        .check(state.deps.as_ref())
        .await?;

    let keys = sync_role_permissions(id, body.permissions, &state.deps).await?;
    Ok(Json(serde_json::json!({ "permissions": keys })))
}
