use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::common::{StepId, UserId, WorkflowId};
use crate::domains::workflows::commands::ExecuteWorkflowCommand;
use crate::domains::workflows::data::{
    CreateWorkflowInput, UpdateWorkflowInput, WorkflowDetail, WorkflowGraphInput,
};
use crate::domains::workflows::engine::{validate_graph, ActionRegistry};
use crate::domains::workflows::models::{
    FieldMapping, StepConnection, Workflow, WorkflowStatus, WorkflowStep,
};
use crate::kernel::jobs::Job;
use crate::kernel::ServerDeps;

use super::queries::load_detail;

/// Outcome of storing or replacing a workflow graph
#[derive(Debug)]
pub enum WorkflowSaveResult {
    Saved(WorkflowDetail),
    /// The graph failed validation; nothing was written
    Invalid(Vec<String>),
}

/// Outcome of an activation attempt
#[derive(Debug)]
pub enum ActivateWorkflowResult {
    Activated(Workflow),
    /// The stored graph no longer validates; status is unchanged
    Invalid(Vec<String>),
}

/// Store a new workflow as a draft. The whole graph lands in one
/// transaction or not at all.
pub async fn create_workflow(
    input: CreateWorkflowInput,
    created_by: UserId,
    deps: &ServerDeps,
) -> Result<WorkflowSaveResult> {
    let name = input.name.trim();
    if name.is_empty() {
        bail!("Workflow name cannot be empty");
    }

    let violations = validate_graph(&input.graph, &ActionRegistry::builtin());
    if !violations.is_empty() {
        return Ok(WorkflowSaveResult::Invalid(violations));
    }

    let mut tx = deps.db_pool.begin().await?;
    let workflow = Workflow::new(
        name.to_string(),
        input.description.clone(),
        created_by,
    )
    .insert(&mut tx)
    .await?;
    let (steps, connections, mappings) = insert_graph(&workflow, &input.graph, &mut tx).await?;
    tx.commit().await?;

    info!(workflow_id = %workflow.id, name = %workflow.name, "workflow created");

    Ok(WorkflowSaveResult::Saved(WorkflowDetail {
        workflow,
        steps,
        connections,
        mappings,
    }))
}

/// Replace a workflow's graph wholesale and bump its version.
///
/// Allowed in any status but Archived. When the workflow is Active its
/// schedule registration is synced to the new graph.
pub async fn update_workflow(
    workflow_id: WorkflowId,
    input: UpdateWorkflowInput,
    deps: &ServerDeps,
) -> Result<WorkflowSaveResult> {
    let workflow = Workflow::find_by_id(workflow_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Workflow not found: {}", workflow_id))?;

    if workflow.status == WorkflowStatus::Archived {
        bail!("Archived workflows cannot be edited");
    }

    let name = input.name.trim();
    if name.is_empty() {
        bail!("Workflow name cannot be empty");
    }

    let violations = validate_graph(&input.graph, &ActionRegistry::builtin());
    if !violations.is_empty() {
        return Ok(WorkflowSaveResult::Invalid(violations));
    }

    let mut tx = deps.db_pool.begin().await?;
    // Children first: mappings and connections reference steps
    FieldMapping::delete_for_workflow(workflow_id, &mut tx).await?;
    StepConnection::delete_for_workflow(workflow_id, &mut tx).await?;
    WorkflowStep::delete_for_workflow(workflow_id, &mut tx).await?;
    let workflow =
        Workflow::replace_header(workflow_id, name, input.description.as_deref(), &mut tx).await?;
    let (steps, connections, mappings) = insert_graph(&workflow, &input.graph, &mut tx).await?;
    tx.commit().await?;

    let detail = WorkflowDetail {
        workflow,
        steps,
        connections,
        mappings,
    };

    if detail.workflow.status == WorkflowStatus::Active {
        sync_schedule_registration(&detail, deps).await?;
    }

    info!(
        workflow_id = %detail.workflow.id,
        version = detail.workflow.version,
        "workflow graph replaced"
    );

    Ok(WorkflowSaveResult::Saved(detail))
}

/// Activate a Draft or Paused workflow.
/// The stored graph is re-validated first: action config rules may have
/// tightened since it was saved.
pub async fn activate_workflow(
    workflow_id: WorkflowId,
    deps: &ServerDeps,
) -> Result<ActivateWorkflowResult> {
    let workflow = Workflow::find_by_id(workflow_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Workflow not found: {}", workflow_id))?;

    match workflow.status {
        WorkflowStatus::Draft | WorkflowStatus::Paused => {}
        WorkflowStatus::Active => bail!("Workflow is already active"),
        WorkflowStatus::Archived => bail!("Archived workflows cannot be activated"),
    }

    let detail = load_detail(workflow, &deps.db_pool).await?;
    let violations = validate_graph(&detail.as_graph_input(), &ActionRegistry::builtin());
    if !violations.is_empty() {
        return Ok(ActivateWorkflowResult::Invalid(violations));
    }

    let workflow = Workflow::set_status(workflow_id, WorkflowStatus::Active, &deps.db_pool).await?;

    if let Some(trigger) = detail.trigger_step() {
        if trigger.step_type == "trigger.schedule" {
            register_schedule_trigger(workflow_id, trigger, deps).await?;
        }
    }

    info!(workflow_id = %workflow.id, "workflow activated");
    Ok(ActivateWorkflowResult::Activated(workflow))
}

/// Pause an Active workflow: no more trigger matches, schedule entry
/// removed, not-yet-claimed executions cancelled.
pub async fn pause_workflow(workflow_id: WorkflowId, deps: &ServerDeps) -> Result<Workflow> {
    let workflow = Workflow::find_by_id(workflow_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Workflow not found: {}", workflow_id))?;

    if workflow.status != WorkflowStatus::Active {
        bail!("Only active workflows can be paused");
    }

    let workflow = Workflow::set_status(workflow_id, WorkflowStatus::Paused, &deps.db_pool).await?;
    deps.schedule_registry
        .unregister(workflow_id.into_uuid())
        .await?;
    let cancelled = cancel_pending_executions(workflow_id, deps).await?;

    info!(workflow_id = %workflow.id, cancelled, "workflow paused");
    Ok(workflow)
}

/// Archive a workflow from any non-archived status. Terminal.
pub async fn archive_workflow(workflow_id: WorkflowId, deps: &ServerDeps) -> Result<Workflow> {
    let workflow = Workflow::find_by_id(workflow_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Workflow not found: {}", workflow_id))?;

    if workflow.status == WorkflowStatus::Archived {
        bail!("Workflow is already archived");
    }

    let workflow =
        Workflow::set_status(workflow_id, WorkflowStatus::Archived, &deps.db_pool).await?;
    deps.schedule_registry
        .unregister(workflow_id.into_uuid())
        .await?;
    let cancelled = cancel_pending_executions(workflow_id, deps).await?;

    info!(workflow_id = %workflow.id, cancelled, "workflow archived");
    Ok(workflow)
}

/// Re-register schedule triggers for every Active workflow.
/// Called once at boot; cron entries live in process memory only.
pub async fn register_active_schedules(deps: &ServerDeps) -> Result<usize> {
    let mut registered = 0;

    for workflow in Workflow::find_active(&deps.db_pool).await? {
        let steps = WorkflowStep::find_for_workflow(workflow.id, &deps.db_pool).await?;
        let Some(trigger) = steps
            .iter()
            .find(|s| s.kind == crate::domains::workflows::models::StepKind::Trigger)
        else {
            continue;
        };

        if trigger.step_type == "trigger.schedule" {
            match register_schedule_trigger(workflow.id, trigger, deps).await {
                Ok(()) => registered += 1,
                Err(e) => warn!(
                    workflow_id = %workflow.id,
                    error = %e,
                    "failed to re-register schedule trigger"
                ),
            }
        }
    }

    Ok(registered)
}

/// Insert a submitted graph under a workflow, resolving client step keys
/// to freshly assigned step ids.
async fn insert_graph(
    workflow: &Workflow,
    graph: &WorkflowGraphInput,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<(Vec<WorkflowStep>, Vec<StepConnection>, Vec<FieldMapping>)> {
    let mut key_to_id: HashMap<&str, StepId> = HashMap::new();
    let mut steps = Vec::with_capacity(graph.steps.len());

    for step_input in &graph.steps {
        let step = WorkflowStep::new(
            workflow.id,
            step_input.kind,
            step_input.step_type.clone(),
            step_input.name.clone(),
            step_input.config_or_empty(),
            step_input.position,
        )
        .insert(tx)
        .await?;
        key_to_id.insert(step_input.key.as_str(), step.id);
        steps.push(step);
    }

    let resolve = |key: &str| -> Result<StepId> {
        key_to_id
            .get(key)
            .copied()
            .ok_or_else(|| anyhow!("unknown step key '{}'", key))
    };

    let mut connections = Vec::with_capacity(graph.connections.len());
    for conn in &graph.connections {
        connections.push(
            StepConnection::new(
                workflow.id,
                resolve(&conn.from)?,
                resolve(&conn.to)?,
                conn.condition.clone(),
                conn.position,
            )
            .insert(tx)
            .await?,
        );
    }

    let mut mappings = Vec::with_capacity(graph.mappings.len());
    for mapping in &graph.mappings {
        mappings.push(
            FieldMapping::new(
                workflow.id,
                resolve(&mapping.step)?,
                mapping.source.clone(),
                mapping.target.clone(),
                mapping.required,
            )
            .insert(tx)
            .await?,
        );
    }

    Ok((steps, connections, mappings))
}

/// Point the cron scheduler at a workflow's schedule trigger.
/// Each fire mints a fresh event id, so every occurrence executes exactly
/// one run per workflow.
pub(crate) async fn register_schedule_trigger(
    workflow_id: WorkflowId,
    trigger: &WorkflowStep,
    deps: &ServerDeps,
) -> Result<()> {
    let cron = trigger
        .config
        .get("cron")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("schedule trigger is missing its cron config"))?;

    deps.schedule_registry
        .register(workflow_id.into_uuid(), cron, move || {
            ExecuteWorkflowCommand {
                workflow_id,
                trigger_type: "trigger.schedule".to_string(),
                event_id: Uuid::now_v7(),
                payload: json!({ "fired_at": Utc::now() }),
            }
        })
        .await
}

/// After a graph replacement on an Active workflow, keep the cron entry in
/// step with the new graph: register when the trigger is (still) a
/// schedule, drop the entry when it no longer is.
async fn sync_schedule_registration(detail: &WorkflowDetail, deps: &ServerDeps) -> Result<()> {
    match detail.trigger_step() {
        Some(trigger) if trigger.step_type == "trigger.schedule" => {
            register_schedule_trigger(detail.workflow.id, trigger, deps).await
        }
        _ => {
            deps.schedule_registry
                .unregister(detail.workflow.id.into_uuid())
                .await
        }
    }
}

/// Cancel not-yet-claimed executions of a workflow.
/// Running executions notice the status flip themselves.
async fn cancel_pending_executions(workflow_id: WorkflowId, deps: &ServerDeps) -> Result<usize> {
    let pending = Job::find_pending_by_type(ExecuteWorkflowCommand::JOB_TYPE, &deps.db_pool).await?;
    let workflow_uuid = json!(workflow_id);

    let mut cancelled = 0;
    for job in pending {
        let matches = job
            .args
            .as_ref()
            .and_then(|args| args.get("workflow_id"))
            .map(|v| *v == workflow_uuid)
            .unwrap_or(false);

        if matches && deps.job_queue.cancel(job.id).await? {
            cancelled += 1;
        }
    }

    Ok(cancelled)
}
