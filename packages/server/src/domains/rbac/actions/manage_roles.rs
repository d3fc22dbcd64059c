//! Role create/update/delete actions

use anyhow::{bail, Result};
use tracing::info;

use crate::common::RoleId;
use crate::domains::rbac::models::Role;
use crate::kernel::ServerDeps;

pub async fn create_role(
    name: String,
    description: Option<String>,
    deps: &ServerDeps,
) -> Result<Role> {
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("Role name is invalid: must not be empty");
    }

    if Role::find_by_name(&name, &deps.db_pool).await?.is_some() {
        bail!("Role name already in use: {}", name);
    }

    let role = Role::new(name, description).insert(&deps.db_pool).await?;

    info!(role_id = %role.id, role = %role.name, "created role");
    Ok(role)
}

pub async fn update_role(
    role_id: RoleId,
    name: String,
    description: Option<String>,
    deps: &ServerDeps,
) -> Result<Role> {
    let existing = Role::find_by_id(role_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Role not found: {}", role_id))?;

    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("Role name is invalid: must not be empty");
    }

    if existing.is_system && existing.name != name {
        bail!("System roles cannot be renamed");
    }

    if let Some(conflict) = Role::find_by_name(&name, &deps.db_pool).await? {
        if conflict.id != role_id {
            bail!("Role name already in use: {}", name);
        }
    }

    Role::update(role_id, &name, description.as_deref(), &deps.db_pool).await
}

/// Delete a role that is not a system role and has no assigned users.
pub async fn delete_role(role_id: RoleId, deps: &ServerDeps) -> Result<()> {
    let role = Role::find_by_id(role_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Role not found: {}", role_id))?;

    if role.is_system {
        bail!("System roles cannot be deleted");
    }

    let assigned = Role::user_count(role_id, &deps.db_pool).await?;
    if assigned > 0 {
        bail!("Role has {} assigned users and cannot be deleted", assigned);
    }

    Role::delete(role_id, &deps.db_pool).await?;

    deps.cache
        .invalidate(&ServerDeps::role_perms_cache_key(role_id))
        .await;

    info!(role_id = %role_id, role = %role.name, "deleted role");
    Ok(())
}
