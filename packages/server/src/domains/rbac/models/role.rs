use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::common::RoleId;

/// Role model - a named bundle of permissions assignable to users.
///
/// System roles are seeded by migrations and cannot be renamed or deleted.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, description: Option<String>) -> Self {
        Self {
            id: RoleId::new(),
            name,
            description,
            is_system: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Find role by ID
    pub async fn find_by_id(id: RoleId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Find role by name (names are unique)
    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// All roles ordered by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM roles ORDER BY name ASC")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert new role
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO roles (id, name, description, is_system)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.is_system)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Update name and description
    pub async fn update(
        id: RoleId,
        name: &str,
        description: Option<&str>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE roles
             SET name = $2, description = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Delete a role. Callers must first check it has no assigned users.
    pub async fn delete(id: RoleId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND is_system = false")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of users assigned to this role
    pub async fn user_count(id: RoleId, pool: &PgPool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Permission keys currently granted to this role, ordered for stable output
    pub async fn permission_keys(id: RoleId, pool: &PgPool) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT p.key
             FROM role_permissions rp
             JOIN permissions p ON p.id = rp.permission_id
             WHERE rp.role_id = $1
             ORDER BY p.key ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
