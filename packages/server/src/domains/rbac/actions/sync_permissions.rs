//! Transactional role permission sync

use std::str::FromStr;

use anyhow::{bail, Result};
use tracing::info;

use crate::common::auth::Permission as PermissionKey;
use crate::common::RoleId;
use crate::domains::rbac::models::{Permission, Role};
use crate::kernel::ServerDeps;

/// Replace a role's permission set with exactly the given keys.
///
/// The delete-and-insert runs in one transaction so concurrent permission
/// checks never observe a half-updated set. Unknown keys are rejected
/// before anything is touched. Returns the new key set, sorted.
pub async fn sync_role_permissions(
    role_id: RoleId,
    permission_keys: Vec<String>,
    deps: &ServerDeps,
) -> Result<Vec<String>> {
    // Reject unknown keys up front
    for key in &permission_keys {
        if PermissionKey::from_str(key).is_err() {
            bail!("Unknown permission key: {}", key);
        }
    }

    let role = Role::find_by_id(role_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Role not found: {}", role_id))?;

    let permissions = Permission::find_by_keys(&permission_keys, &deps.db_pool).await?;
    if permissions.len() != permission_keys.len() {
        // Keys are enum-valid but missing from the table; seeds are out of date
        bail!("One or more permission keys are not provisioned");
    }

    let mut tx = deps.db_pool.begin().await?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

    for permission in &permissions {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)",
        )
        .bind(role_id)
        .bind(permission.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    // Drop the cached key set so the next permission check sees the new grants
    deps.cache
        .invalidate(&ServerDeps::role_perms_cache_key(role_id))
        .await;

    let keys = Role::permission_keys(role_id, &deps.db_pool).await?;

    info!(
        role = %role.name,
        count = keys.len(),
        "synced role permissions"
    );

    Ok(keys)
}
