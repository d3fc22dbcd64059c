use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::pagination::{PaginationDirection, ValidatedPaginationArgs};
use crate::common::{UserId, WorkflowId};

/// Workflow lifecycle
///
/// Only `Active` workflows receive trigger events. `Archived` is terminal
/// for the graph: it can no longer be edited or activated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "workflow_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

/// Automation definition row.
///
/// The graph itself lives in `workflow_steps`, `step_connections`, and
/// `field_mappings`; `version` bumps whenever the graph is replaced so runs
/// can record which shape of the graph they executed.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkflowStatus,
    pub version: i32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: String, description: Option<String>, created_by: UserId) -> Self {
        let now = Utc::now();
        Workflow {
            id: WorkflowId::new(),
            name,
            description,
            status: WorkflowStatus::Draft,
            version: 1,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Find workflow by ID
    pub async fn find_by_id(id: WorkflowId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM workflows WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// All active workflows (boot-time schedule re-registration)
    pub async fn find_active(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM workflows WHERE status = 'active' ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert new workflow
    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO workflows (
                id,
                name,
                description,
                status,
                version,
                created_by,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.description)
        .bind(self.status)
        .bind(self.version)
        .bind(self.created_by)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Update name/description and bump the graph version.
    /// Runs inside the graph-replacement transaction.
    pub async fn replace_header(
        id: WorkflowId,
        name: &str,
        description: Option<&str>,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE workflows
             SET name = $2,
                 description = $3,
                 version = version + 1,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Move a workflow to a new lifecycle status
    pub async fn set_status(id: WorkflowId, status: WorkflowStatus, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE workflows SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Find workflows with cursor pagination and optional status filter
    pub async fn find_paginated(
        status: Option<WorkflowStatus>,
        args: &ValidatedPaginationArgs,
        pool: &PgPool,
    ) -> Result<(Vec<Self>, bool)> {
        let fetch_limit = args.fetch_limit();

        let results = match args.direction {
            PaginationDirection::Forward => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM workflows
                    WHERE ($1::workflow_status IS NULL OR status = $1)
                      AND ($2::uuid IS NULL OR id > $2)
                    ORDER BY id ASC
                    LIMIT $3
                    "#,
                )
                .bind(status)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?
            }
            PaginationDirection::Backward => {
                let mut rows = sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM workflows
                    WHERE ($1::workflow_status IS NULL OR status = $1)
                      AND ($2::uuid IS NULL OR id < $2)
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(status)
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
