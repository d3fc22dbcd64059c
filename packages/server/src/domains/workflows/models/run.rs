use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::pagination::{PaginationDirection, ValidatedPaginationArgs};
use crate::common::{RunId, StepId, StepRunId, WorkflowId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// One execution of a workflow graph.
///
/// `workflow_version` pins the run to the graph shape it executed, and
/// `trigger_event` keeps the full trigger payload for replay and debugging.
/// Runs are the retry surface: the executing job reports success to the
/// queue even when the run fails, so a failed run is inspected and re-fired,
/// never silently re-run.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub workflow_version: i32,
    pub trigger_event: serde_json::Value,
    pub status: RunStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(
        workflow_id: WorkflowId,
        workflow_version: i32,
        trigger_event: serde_json::Value,
    ) -> Self {
        WorkflowRun {
            id: RunId::new(),
            workflow_id,
            workflow_version,
            trigger_event,
            status: RunStatus::Running,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub async fn find_by_id(id: RunId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM workflow_runs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO workflow_runs (
                id,
                workflow_id,
                workflow_version,
                trigger_event,
                status,
                error,
                started_at,
                finished_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.workflow_id)
        .bind(self.workflow_version)
        .bind(&self.trigger_event)
        .bind(self.status)
        .bind(&self.error)
        .bind(self.started_at)
        .bind(self.finished_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_succeeded(id: RunId, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE workflow_runs
             SET status = 'succeeded', finished_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_failed(id: RunId, error: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE workflow_runs
             SET status = 'failed', error = $2, finished_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(error)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Fail runs stuck in `running` past the given age.
    /// Catches executor crashes that never reached a terminal update.
    pub async fn fail_stale_runs(minutes: i64, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE workflow_runs
             SET status = 'failed',
                 error = 'stale: executor did not finish',
                 finished_at = NOW()
             WHERE status = 'running'
               AND started_at < NOW() - ($1 || ' minutes')::INTERVAL",
        )
        .bind(minutes.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Runs of a workflow, newest first
    pub async fn find_paginated(
        workflow_id: WorkflowId,
        status: Option<RunStatus>,
        args: &ValidatedPaginationArgs,
        pool: &PgPool,
    ) -> Result<(Vec<Self>, bool)> {
        let fetch_limit = args.fetch_limit();

        let results = match args.direction {
            PaginationDirection::Forward => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM workflow_runs
                    WHERE workflow_id = $1
                      AND ($2::run_status IS NULL OR status = $2)
                      AND ($3::uuid IS NULL OR id < $3)
                    ORDER BY id DESC
                    LIMIT $4
                    "#,
                )
                .bind(workflow_id)
                .bind(status)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?
            }
            PaginationDirection::Backward => {
                let mut rows = sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM workflow_runs
                    WHERE workflow_id = $1
                      AND ($2::run_status IS NULL OR status = $2)
                      AND ($3::uuid IS NULL OR id > $3)
                    ORDER BY id ASC
                    LIMIT $4
                    "#,
                )
                .bind(workflow_id)
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

/// Per-step execution record, written once after the step finishes.
/// `input` is the resolved action input (mappings applied), `output` is
/// whatever the handler returned and becomes visible to downstream mappings.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct StepRun {
    pub id: StepRunId,
    pub run_id: RunId,
    pub step_id: StepId,
    pub step_type: String,
    pub status: RunStatus,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepRun {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO step_runs (
                id,
                run_id,
                step_id,
                step_type,
                status,
                input,
                output,
                error,
                started_at,
                finished_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.run_id)
        .bind(self.step_id)
        .bind(&self.step_type)
        .bind(self.status)
        .bind(&self.input)
        .bind(&self.output)
        .bind(&self.error)
        .bind(self.started_at)
        .bind(self.finished_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Step records of a run in execution order
    pub async fn find_for_run(run_id: RunId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM step_runs WHERE run_id = $1 ORDER BY started_at, id",
        )
        .bind(run_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
