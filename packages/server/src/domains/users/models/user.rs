use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::pagination::{PaginationDirection, ValidatedPaginationArgs};
use crate::common::{RoleId, UserId};

/// User model - SQL persistence layer
///
/// Staff accounts. Users sign in with a phone number or email address (the
/// normalized `identifier` column) and never hold a password; authentication
/// is OTP-based. `is_admin` bypasses role permission checks entirely.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Normalized login identifier: E.164 phone or lowercase email.
    pub identifier: String,
    pub role_id: RoleId,
    pub is_admin: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for listing users. Deserializes straight from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub active: Option<bool>,
    pub role_id: Option<RoleId>,
}

impl User {
    pub fn new(name: String, identifier: String, role_id: RoleId, is_admin: bool) -> Self {
        let now = Utc::now();
        User {
            id: UserId::new(),
            name,
            identifier,
            role_id,
            is_admin,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find user by ID
    pub async fn find_by_id(id: UserId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Find user by normalized login identifier
    pub async fn find_by_identifier(identifier: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE identifier = $1")
            .bind(identifier)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Find all active admins (notification fan-out targets)
    pub async fn find_active_admins(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM users WHERE is_admin = true AND active = true ORDER BY created_at ASC",
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Insert new user
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO users (
                id,
                name,
                identifier,
                role_id,
                is_admin,
                active,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.identifier)
        .bind(self.role_id)
        .bind(self.is_admin)
        .bind(self.active)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Find users with cursor pagination and optional filters
    pub async fn find_paginated(
        filter: &UserFilter,
        args: &ValidatedPaginationArgs,
        pool: &PgPool,
    ) -> Result<(Vec<Self>, bool)> {
        let fetch_limit = args.fetch_limit();

        let results = match args.direction {
            PaginationDirection::Forward => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM users
                    WHERE ($1::bool IS NULL OR active = $1)
                      AND ($2::uuid IS NULL OR role_id = $2)
                      AND ($3::uuid IS NULL OR id > $3)
                    ORDER BY id ASC
                    LIMIT $4
                    "#,
                )
                .bind(filter.active)
                .bind(filter.role_id)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?
            }
            PaginationDirection::Backward => {
                let mut rows = sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM users
                    WHERE ($1::bool IS NULL OR active = $1)
                      AND ($2::uuid IS NULL OR role_id = $2)
                      AND ($3::uuid IS NULL OR id < $3)
                    ORDER BY id DESC
                    LIMIT $4
                    "#,
                )
                .bind(filter.active)
                .bind(filter.role_id)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?;

                rows.reverse();
                rows
            }
        };

        let has_more = results.len() > args.limit as usize;
        let results = if has_more {
            results.into_iter().take(args.limit as usize).collect()
        } else {
            results
        };

        Ok((results, has_more))
    }
}
