use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::{MappingId, StepId, WorkflowId};

/// Declarative input wiring for an action step.
///
/// `source` is a slash path into the run context ("trigger/lead/email",
/// "steps/<step-id>/event_id"); `target` is the key it lands under in the
/// action's input object. A `required` mapping whose source is missing
/// fails the step before the action runs.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct FieldMapping {
    pub id: MappingId,
    pub workflow_id: WorkflowId,
    pub step_id: StepId,
    pub source: String,
    pub target: String,
    pub required: bool,
    pub created_at: DateTime<Utc>,
}

impl FieldMapping {
    pub fn new(
        workflow_id: WorkflowId,
        step_id: StepId,
        source: String,
        target: String,
        required: bool,
    ) -> Self {
        FieldMapping {
            id: MappingId::new(),
            workflow_id,
            step_id,
            source,
            target,
            required,
            created_at: Utc::now(),
        }
    }

    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO field_mappings (
                id,
                workflow_id,
                step_id,
                source,
                target,
                required,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *",
        )
        .bind(self.id)
        .bind(self.workflow_id)
        .bind(self.step_id)
        .bind(&self.source)
        .bind(&self.target)
        .bind(self.required)
        .bind(self.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    pub async fn find_for_workflow(workflow_id: WorkflowId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM field_mappings WHERE workflow_id = $1 ORDER BY step_id, id",
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
        let result = sqlx::query("DELETE FROM field_mappings WHERE workflow_id = $1")
            .bind(workflow_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}
