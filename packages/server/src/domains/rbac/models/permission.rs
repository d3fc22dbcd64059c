use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::common::PermissionId;

/// Permission model - one row per grantable permission key.
///
/// Rows are seeded by migrations from the fixed permission set; the API
/// never creates or deletes them, only attaches them to roles.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Permission {
    pub id: PermissionId,
    pub key: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// All permissions ordered by key
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM permissions ORDER BY key ASC")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Permissions matching the given keys
    pub async fn find_by_keys(keys: &[String], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM permissions WHERE key = ANY($1) ORDER BY key ASC",
        )
        .bind(keys)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
