use super::{AuthError, Permission};
use crate::common::entity_ids::{RoleId, UserId};
use anyhow::Result;
use async_trait::async_trait;

/// Entry point for authorization checks
///
/// Usage:
/// ```rust,ignore
/// Actor::new(user_id, role_id, is_admin)
///     .can(Permission::LeadsManage)
///     .check(deps.as_ref())
///     .await?;
/// ```
pub struct Actor {
    actor_id: UserId,
    role_id: RoleId,
    is_admin: bool,
}

impl Actor {
    /// Create a new actor for authorization checks
    ///
    /// # Arguments
    /// * `actor_id` - The user ID of the actor
    /// * `role_id` - The actor's role, from the JWT claims
    /// * `is_admin` - Admin flag from the JWT (set at login from the system role)
    pub fn new(actor_id: UserId, role_id: RoleId, is_admin: bool) -> Self {
        Self {
            actor_id,
            role_id,
            is_admin,
        }
    }

    /// Specify what permission the actor needs
    pub fn can(self, permission: Permission) -> CapabilityBuilder {
        CapabilityBuilder {
            actor_id: self.actor_id,
            role_id: self.role_id,
            is_admin: self.is_admin,
            permission,
        }
    }
}

/// Builder after specifying the required permission
pub struct CapabilityBuilder {
    actor_id: UserId,
    role_id: RoleId,
    is_admin: bool,
    permission: Permission,
}

impl CapabilityBuilder {
    /// Perform the authorization check
    pub async fn check<D>(self, deps: &D) -> Result<(), AuthError>
    where
        D: HasAuthContext + ?Sized,
    {
        check_permission(
            self.actor_id,
            self.role_id,
            self.is_admin,
            self.permission,
            deps,
        )
        .await
    }
}

/// Trait for dependencies that can resolve a role to its permission keys.
///
/// The production implementation reads through the tag cache so permission
/// checks don't hit the database on every request.
#[async_trait]
pub trait HasAuthContext: Send + Sync {
    async fn role_permission_keys(&self, role_id: RoleId) -> Result<Vec<String>, AuthError>;
}

/// Core permission check.
///
/// The admin flag comes from the JWT, which was set at login by looking at
/// the user's role. We trust it because tokens are signed and short-lived;
/// non-admin actors go through the role's stored permission set.
async fn check_permission<D>(
    _actor_id: UserId,
    role_id: RoleId,
    is_admin: bool,
    permission: Permission,
    deps: &D,
) -> Result<(), AuthError>
where
    D: HasAuthContext + ?Sized,
{
    if is_admin {
        return Ok(());
    }

    let keys = deps.role_permission_keys(role_id).await?;
    if keys.iter().any(|k| k == permission.as_key()) {
        return Ok(());
    }

    Err(AuthError::PermissionDenied(permission.as_key().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TestDeps {
        grants: HashMap<RoleId, Vec<String>>,
    }

    #[async_trait]
    impl HasAuthContext for TestDeps {
        async fn role_permission_keys(&self, role_id: RoleId) -> Result<Vec<String>, AuthError> {
            Ok(self.grants.get(&role_id).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_admin_bypasses_role_lookup() {
        let deps = TestDeps {
            grants: HashMap::new(),
        };

        let result = Actor::new(UserId::new(), RoleId::new(), true)
            .can(Permission::RolesManage)
            .check(&deps)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_granted_permission_allowed() {
        let role_id = RoleId::new();
        let mut grants = HashMap::new();
        grants.insert(role_id, vec!["leads.manage".to_string()]);
        let deps = TestDeps { grants };

        let result = Actor::new(UserId::new(), role_id, false)
            .can(Permission::LeadsManage)
            .check(&deps)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_permission_denied() {
        let role_id = RoleId::new();
        let mut grants = HashMap::new();
        grants.insert(role_id, vec!["leads.view".to_string()]);
        let deps = TestDeps { grants };

        let result = Actor::new(UserId::new(), role_id, false)
            .can(Permission::LeadsManage)
            .check(&deps)
            .await;

        assert!(matches!(result, Err(AuthError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_unknown_role_denied() {
        let deps = TestDeps {
            grants: HashMap::new(),
        };

        let result = Actor::new(UserId::new(), RoleId::new(), false)
            .can(Permission::LeadsView)
            .check(&deps)
            .await;

        assert!(matches!(result, Err(AuthError::PermissionDenied(_))));
    }
}
