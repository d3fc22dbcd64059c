//! The REST error envelope.
//!
//! Every failing endpoint answers with the same JSON shape:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Lead not found: ..." } }
//! ```
//!
//! Actions return `anyhow::Error` with human-readable messages, so the
//! boundary sorts them by phrasing convention: "not found" is a 404, state
//! problems ("already ...", "cannot be ...") are 409s, input problems
//! ("is invalid", "must ...") are 400s. Anything unrecognized becomes a 500
//! and is logged with its full chain; the client only sees a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::auth::AuthError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// OTP login: no active account matches the submitted identifier.
    #[error("No active account matches this identifier")]
    NotRegistered,

    /// OTP login: wrong code, or the code has expired.
    #[error("The code is incorrect or has expired")]
    InvalidCode,

    /// OTP login: attempt budget exhausted, a fresh code must be requested.
    #[error("Too many failed attempts; request a new code")]
    LockedOut,

    /// OTP resend asked for before the cooldown elapsed.
    #[error("Wait {0} seconds before requesting another code")]
    CooldownActive(i64),

    #[error("Resend limit reached; request a new code")]
    ResendLimitReached,

    /// Workflow graph failed validation; the individual problems ride along
    /// in the envelope's `details` array.
    #[error("Workflow graph failed validation")]
    InvalidWorkflow(Vec<String>),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotRegistered => StatusCode::NOT_FOUND,
            ApiError::InvalidCode => StatusCode::UNAUTHORIZED,
            ApiError::LockedOut => StatusCode::TOO_MANY_REQUESTS,
            ApiError::CooldownActive(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ResendLimitReached => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidWorkflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "invalid_request",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotRegistered => "not_registered",
            ApiError::InvalidCode => "invalid_code",
            ApiError::LockedOut => "locked_out",
            ApiError::CooldownActive(_) => "cooldown_active",
            ApiError::ResendLimitReached => "resend_limit_reached",
            ApiError::InvalidWorkflow(_) => "invalid_workflow",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::CooldownActive(seconds) => {
                Some(json!({ "retry_in_seconds": seconds }))
            }
            ApiError::InvalidWorkflow(errors) => Some(json!(errors)),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            tracing::error!(error = ?err, "request failed");
        }

        let mut body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        if let Some(details) = self.details() {
            body["error"]["details"] = details;
        }

        (self.status(), Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthenticationRequired | AuthError::InvalidToken => ApiError::Unauthorized,
            AuthError::PermissionDenied(_) | AuthError::AdminRequired => {
                ApiError::Forbidden(err.to_string())
            }
            AuthError::DatabaseError(e) => ApiError::Internal(e.into()),
            AuthError::InternalError(e) => ApiError::Internal(e),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Permission failures travel through `?` as anyhow; unwrap them first.
        match err.downcast::<AuthError>() {
            Ok(auth) => auth.into(),
            Err(err) => classify(err),
        }
    }
}

/// Sort an action error into a status bucket by its message.
///
/// The buckets match the phrasing conventions the actions use. Validation is
/// checked before conflict so that "name cannot be empty" lands on 400, not
/// on the "cannot be" conflict marker.
fn classify(err: anyhow::Error) -> ApiError {
    let message = err.to_string();
    let lower = message.to_lowercase();

    if lower.contains("not found") {
        return ApiError::NotFound(message);
    }

    if lower.contains("is invalid")
        || lower.contains("must ")
        || lower.contains("empty")
        || lower.contains("invalid ")
        || lower.contains("cannot use")
        || lower.contains("unknown permission")
    {
        return ApiError::Validation(message);
    }

    if lower.contains("already")
        || lower.contains("cannot be")
        || lower.contains("not connected")
        || lower.contains("not configured")
        || lower.contains("active admin")
        || lower.contains("deactivated")
        || lower.contains("can be paused")
        || lower.contains("can be activated")
    {
        return ApiError::Conflict(message);
    }

    ApiError::Internal(err)
}
