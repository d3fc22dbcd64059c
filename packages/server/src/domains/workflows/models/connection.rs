use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::{ConnectionId, StepId, WorkflowId};

/// A directed edge between two steps.
///
/// `condition` is an optional expression evaluated against the run context;
/// when it is absent the edge always matches. `position` orders the outgoing
/// edges of a step so branch evaluation is deterministic.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct StepConnection {
    pub id: ConnectionId,
    pub workflow_id: WorkflowId,
    pub from_step_id: StepId,
    pub to_step_id: StepId,
    pub condition: Option<serde_json::Value>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl StepConnection {
    pub fn new(
        workflow_id: WorkflowId,
        from_step_id: StepId,
        to_step_id: StepId,
        condition: Option<serde_json::Value>,
        position: i32,
    ) -> Self {
        StepConnection {
            id: ConnectionId::new(),
            workflow_id,
            from_step_id,
            to_step_id,
            condition,
            position,
            created_at: Utc::now(),
        }
    }

    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO step_connections (
                id,
                workflow_id,
                from_step_id,
                to_step_id,
                condition,
                position,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.workflow_id)
        .bind(self.from_step_id)
        .bind(self.to_step_id)
        .bind(&self.condition)
        .bind(self.position)
        .bind(self.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// All edges of a workflow, ordered for deterministic traversal
    pub async fn find_for_workflow(workflow_id: WorkflowId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM step_connections WHERE workflow_id = $1 ORDER BY from_step_id, position, id",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn delete_for_workflow(
        workflow_id: WorkflowId,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM step_connections WHERE workflow_id = $1")
            .bind(workflow_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
