use anyhow::{anyhow, Result};
use sqlx::PgPool;

use crate::common::pagination::{Page, PaginationArgs};
use crate::common::{RunId, WorkflowId};
use crate::domains::workflows::data::{RunDetail, WorkflowDetail};
use crate::domains::workflows::models::{
    FieldMapping, RunStatus, StepConnection, StepRun, Workflow, WorkflowRun, WorkflowStatus,
    WorkflowStep,
};
use crate::kernel::ServerDeps;

pub async fn list_workflows(
    status: Option<WorkflowStatus>,
    pagination: PaginationArgs,
    deps: &ServerDeps,
) -> Result<Page<Workflow>> {
    let args = pagination.validate().map_err(|e| anyhow!(e))?;
    let (workflows, has_more) = Workflow::find_paginated(status, &args, &deps.db_pool).await?;
    Ok(Page::build(workflows, has_more, &args, |w| w.id.into_uuid()))
}

/// A workflow with its full graph
pub async fn get_workflow(workflow_id: WorkflowId, deps: &ServerDeps) -> Result<WorkflowDetail> {
    let workflow = Workflow::find_by_id(workflow_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Workflow not found: {}", workflow_id))?;

    load_detail(workflow, &deps.db_pool).await
}

/// Run history of a workflow, newest first
pub async fn list_runs(
    workflow_id: WorkflowId,
    status: Option<RunStatus>,
    pagination: PaginationArgs,
    deps: &ServerDeps,
) -> Result<Page<WorkflowRun>> {
    if Workflow::find_by_id(workflow_id, &deps.db_pool).await?.is_none() {
        return Err(anyhow!("Workflow not found: {}", workflow_id));
    }

    let args = pagination.validate().map_err(|e| anyhow!(e))?;
    let (runs, has_more) =
        WorkflowRun::find_paginated(workflow_id, status, &args, &deps.db_pool).await?;
    Ok(Page::build(runs, has_more, &args, |r| r.id.into_uuid()))
}

/// One run with its step records
pub async fn get_run(run_id: RunId, deps: &ServerDeps) -> Result<RunDetail> {
    let run = WorkflowRun::find_by_id(run_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Run not found: {}", run_id))?;
    let steps = StepRun::find_for_run(run.id, &deps.db_pool).await?;

    Ok(RunDetail { run, steps })
}

pub(crate) async fn load_detail(workflow: Workflow, pool: &PgPool) -> Result<WorkflowDetail> {
    let steps = WorkflowStep::find_for_workflow(workflow.id, pool).await?;
    let connections = StepConnection::find_for_workflow(workflow.id, pool).await?;
    let mappings = FieldMapping::find_for_workflow(workflow.id, pool).await?;

    Ok(WorkflowDetail {
        workflow,
        steps,
        connections,
        mappings,
    })
}
