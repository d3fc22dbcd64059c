use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::pagination::{PaginationDirection, ValidatedPaginationArgs};
use crate::common::{LeadActivityId, LeadId, UserId};

/// What happened to a lead
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "activity_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Updated,
    StatusChanged,
    Assigned,
    NoteAdded,
    Imported,
    WorkflowAction,
    CalendarEventScheduled,
}

/// Append-only trail. One row per state-changing lead operation, written in
/// the same transaction as the mutation itself. `actor_id` is None for
/// system writes (imports, workflow actions).
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct LeadActivity {
    pub id: LeadActivityId,
    pub lead_id: LeadId,
    pub actor_id: Option<UserId>,
    pub kind: ActivityKind,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LeadActivity {
    pub fn new(
        lead_id: LeadId,
        actor_id: Option<UserId>,
        kind: ActivityKind,
        detail: serde_json::Value,
    ) -> Self {
        LeadActivity {
            id: LeadActivityId::new(),
            lead_id,
            actor_id,
            kind,
            detail,
            created_at: Utc::now(),
        }
    }

    /// Insert activity row inside the mutation's transaction
    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO lead_activities (
                id,
                lead_id,
                actor_id,
                kind,
                detail,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.lead_id)
        .bind(self.actor_id)
        .bind(self.kind)
        .bind(&self.detail)
        .bind(self.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Activity trail for a lead, newest first, cursor paginated
    pub async fn find_paginated(
        lead_id: LeadId,
        args: &ValidatedPaginationArgs,
        pool: &PgPool,
    ) -> Result<(Vec<Self>, bool)> {
        let fetch_limit = args.fetch_limit();

        // Newest first, so forward pagination walks down through ids.
        let results = match args.direction {
            PaginationDirection::Forward => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM lead_activities
                    WHERE lead_id = $1
                      AND ($2::uuid IS NULL OR id < $2)
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(lead_id)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?
            }
            PaginationDirection::Backward => {
                let mut rows = sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM lead_activities
                    WHERE lead_id = $1
                      AND ($2::uuid IS NULL OR id > $2)
                    ORDER BY id ASC
                    LIMIT $3
                    "#,
                )
                .bind(lead_id)
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

    /// Count activities for a lead
    pub async fn count_for_lead(lead_id: LeadId, pool: &PgPool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM lead_activities WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }
}
