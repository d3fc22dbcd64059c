/// Authorization module for the CRM
///
/// Provides a fluent API for permission checks:
///
/// ```rust,ignore
/// use crate::common::auth::{Actor, Permission};
///
/// Actor::new(user.user_id, user.role_id, user.is_admin)
///     .can(Permission::LeadsManage)
///     .check(deps.as_ref())
///     .await?;
/// ```
///
/// Checks run at the HTTP boundary, before the handler calls into an
/// action. Actions themselves stay permission-free so that the workflow
/// engine and background jobs can invoke them without a signed-in actor.
mod builder;
mod capability;
mod errors;

pub use builder::{Actor, CapabilityBuilder, HasAuthContext};
pub use capability::{Permission, ALL_PERMISSIONS};
pub use errors::AuthError;
