use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::{middleware::Next, response::Response};
use tracing::debug;

use crate::common::auth::Actor;
use crate::common::{RoleId, UserId};
use crate::domains::auth::JwtService;
use crate::server::error::ApiError;

/// Identity carried by a verified access token.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub is_admin: bool,
}

impl AuthUser {
    /// Actor for permission checks, built from the token's claims.
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role_id, self.is_admin)
    }
}

/// Verifies the bearer token and stores [`AuthUser`] in request extensions.
///
/// An absent or bad token lets the request continue unauthenticated;
/// handlers that take an [`AuthUser`] argument reject it with 401 at
/// extraction time. Public endpoints (health, webhooks, OAuth callbacks)
/// simply never extract it.
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match verify_request_token(&request, &jwt_service) {
        Some(user) => {
            debug!(user_id = %user.user_id, is_admin = user.is_admin, "request authenticated");
            request.extensions_mut().insert(user);
        }
        None => debug!("request carries no valid token"),
    }

    next.run(request).await
}

fn verify_request_token(
    request: &axum::http::Request<axum::body::Body>,
    jwt_service: &JwtService,
) -> Option<AuthUser> {
    let header = request.headers().get("authorization")?.to_str().ok()?;

    // Both "Bearer <token>" and a raw token are accepted
    let token = header.strip_prefix("Bearer ").unwrap_or(header);
    let claims = jwt_service.verify_token(token).ok()?;

    Some(AuthUser {
        user_id: claims.user_id,
        role_id: claims.role_id,
        is_admin: claims.is_admin,
    })
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}
