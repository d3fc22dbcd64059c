//! In-app notification endpoints. Callers only ever see their own rows.

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::common::pagination::{Page, PaginationArgs};
use crate::common::NotificationId;
use crate::domains::notifications::actions::{list_notifications, mark_notification_read};
use crate::domains::notifications::models::Notification;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthUser;

pub fn routes() -> Router {
    Router::new()
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications/:id/read", post(mark_read_handler))
}

async fn list_notifications_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationArgs>,
) -> Result<Json<Page<Notification>>, ApiError> {
    Ok(Json(
        list_notifications(user.user_id, pagination, &state.deps).await?,
    ))
}

/// Marking is scoped to the caller: another user's notification id comes
/// back as 404, not 403, so ids cannot be probed.
async fn mark_read_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ApiError> {
    mark_notification_read(id, user.user_id, &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}
