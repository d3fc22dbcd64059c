use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::{StepId, WorkflowId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "step_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Trigger,
    Action,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepKind::Trigger => "trigger",
            StepKind::Action => "action",
        };
        write!(f, "{}", s)
    }
}

/// A node in a workflow graph.
///
/// Steps are replaced wholesale when the graph is edited, so there is no
/// per-step update path. `step_type` names the trigger or action handler
/// ("trigger.lead_created", "action.send_webhook"); `config` is the
/// handler-specific settings blob validated at save time.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub workflow_id: WorkflowId,
    pub kind: StepKind,
    pub step_type: String,
    pub name: String,
    pub config: serde_json::Value,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl WorkflowStep {
    pub fn new(
        workflow_id: WorkflowId,
        kind: StepKind,
        step_type: String,
        name: String,
        config: serde_json::Value,
        position: i32,
    ) -> Self {
        WorkflowStep {
            id: StepId::new(),
            workflow_id,
            kind,
            step_type,
            name,
            config,
            position,
            created_at: Utc::now(),
        }
    }

    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO workflow_steps (
                id,
                workflow_id,
                kind,
                step_type,
                name,
                config,
                position,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.workflow_id)
        .bind(self.kind)
        .bind(&self.step_type)
        .bind(&self.name)
        .bind(&self.config)
        .bind(self.position)
        .bind(self.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// All steps of a workflow in position order
    pub async fn find_for_workflow(workflow_id: WorkflowId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM workflow_steps WHERE workflow_id = $1 ORDER BY position, id",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Trigger steps of active workflows matching a trigger type.
    /// This is the dispatch entry point: one row per workflow that
    /// should be considered for the event.
    pub async fn find_active_triggers(step_type: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT s.* FROM workflow_steps s
            JOIN workflows w ON w.id = s.workflow_id
            WHERE s.kind = 'trigger'
              AND s.step_type = $1
              AND w.status = 'active'
            ORDER BY s.workflow_id
            "#,
        )
        .bind(step_type)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Remove every step of a workflow (graph replacement)
    pub async fn delete_for_workflow(
        workflow_id: WorkflowId,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM workflow_steps WHERE workflow_id = $1")
            .bind(workflow_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
