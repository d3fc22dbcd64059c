use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::common::pagination::{PaginationDirection, ValidatedPaginationArgs};
use crate::common::{NotificationId, UserId};

/// In-app inbox entry. SMS delivery, when it happens, is fire-and-forget on
/// top of this row; the row is the source of truth.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: UserId, title: String, body: String, payload: serde_json::Value) -> Self {
        Notification {
            id: NotificationId::new(),
            user_id,
            title,
            body,
            payload,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    /// Insert new notification
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO notifications (
                id,
                user_id,
                title,
                body,
                payload,
                read_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(&self.title)
        .bind(&self.body)
        .bind(&self.payload)
        .bind(self.read_at)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// A user's notifications, newest first, cursor paginated
    pub async fn find_paginated(
        user_id: UserId,
        args: &ValidatedPaginationArgs,
        pool: &PgPool,
    ) -> Result<(Vec<Self>, bool)> {
        let fetch_limit = args.fetch_limit();

        let results = match args.direction {
            PaginationDirection::Forward => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM notifications
                    WHERE user_id = $1
                      AND ($2::uuid IS NULL OR id < $2)
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(user_id)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?
            }
            PaginationDirection::Backward => {
                let mut rows = sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM notifications
                    WHERE user_id = $1
                      AND ($2::uuid IS NULL OR id > $2)
                    ORDER BY id ASC
                    LIMIT $3
                    "#,
                )
                .bind(user_id)
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

    /// Mark one of the user's notifications read. Scoped to the owner so a
    /// user can never touch another inbox; re-marking keeps the original
    /// timestamp.
    pub async fn mark_read(id: NotificationId, user_id: UserId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications
             SET read_at = COALESCE(read_at, NOW())
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
