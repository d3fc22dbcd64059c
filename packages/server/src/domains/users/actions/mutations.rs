use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::common::{Identifier, UserId};
use crate::domains::rbac::models::Role;
use crate::domains::users::data::{CreateUserInput, UpdateUserInput};
use crate::domains::users::models::User;
use crate::kernel::ServerDeps;

pub async fn create_user(input: CreateUserInput, deps: &ServerDeps) -> Result<User> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        bail!("User name is invalid: must not be empty");
    }

    let identifier = Identifier::normalize(&input.identifier).map_err(|e| anyhow!(e))?;

    if User::find_by_identifier(&identifier.value, &deps.db_pool)
        .await?
        .is_some()
    {
        bail!("Identifier already in use: {}", identifier.value);
    }

    if Role::find_by_id(input.role_id, &deps.db_pool)
        .await?
        .is_none()
    {
        bail!("Role not found: {}", input.role_id);
    }

    let user = User::new(name, identifier.value, input.role_id, input.is_admin)
        .insert(&deps.db_pool)
        .await?;

    info!(user_id = %user.id, is_admin = user.is_admin, "created user");
    Ok(user)
}

/// Apply a partial update to a user.
///
/// The write runs in a transaction so the last-admin check and the update
/// see the same state: demoting or deactivating the only remaining active
/// admin is rejected.
pub async fn update_user(user_id: UserId, input: UpdateUserInput, deps: &ServerDeps) -> Result<User> {
    let current = User::find_by_id(user_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("User not found: {}", user_id))?;

    let name = match input.name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("User name is invalid: must not be empty");
            }
            name
        }
        None => current.name.clone(),
    };

    let identifier = match input.identifier {
        Some(raw) => {
            let normalized = Identifier::normalize(&raw).map_err(|e| anyhow!(e))?;
            if let Some(existing) =
                User::find_by_identifier(&normalized.value, &deps.db_pool).await?
            {
                if existing.id != user_id {
                    bail!("Identifier already in use: {}", normalized.value);
                }
            }
            normalized.value
        }
        None => current.identifier.clone(),
    };

    if let Some(role_id) = input.role_id {
        if role_id != current.role_id
            && Role::find_by_id(role_id, &deps.db_pool).await?.is_none()
        {
            bail!("Role not found: {}", role_id);
        }
    }

    let role_id = input.role_id.unwrap_or(current.role_id);
    let is_admin = input.is_admin.unwrap_or(current.is_admin);
    let active = input.active.unwrap_or(current.active);

    let mut tx = deps.db_pool.begin().await?;

    // Losing admin status or going inactive counts as stepping down.
    let stepping_down = current.is_admin && current.active && (!is_admin || !active);
    if stepping_down {
        let other_admins = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users
             WHERE is_admin = true AND active = true AND id <> $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if other_admins == 0 {
            bail!("Cannot demote or deactivate the last active admin");
        }
    }

    let updated = sqlx::query_as::<_, User>(
        "UPDATE users
         SET name = $2,
             identifier = $3,
             role_id = $4,
             is_admin = $5,
             active = $6,
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user_id)
    .bind(&name)
    .bind(&identifier)
    .bind(role_id)
    .bind(is_admin)
    .bind(active)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(user_id = %user_id, "updated user");
    Ok(updated)
}
