//! The workflow run loop.
//!
//! Walks the graph depth-first from the trigger step, evaluating edge
//! conditions against the live run context, executing action steps through
//! the [`ActionRegistry`] and recording a [`StepRun`] per action. The run
//! context starts as `{"trigger": <payload>, "steps": {}}` and grows one
//! `steps/<id>` entry per completed action, which is what downstream
//! mappings and conditions see.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::common::{StepId, StepRunId};
use crate::domains::workflows::commands::ExecuteWorkflowCommand;
use crate::domains::workflows::engine::actions::ActionRegistry;
use crate::domains::workflows::engine::condition::Condition;
use crate::domains::workflows::engine::mapping::apply_mappings;
use crate::domains::workflows::models::{
    FieldMapping, RunStatus, StepConnection, StepKind, StepRun, Workflow, WorkflowRun,
    WorkflowStatus, WorkflowStep,
};
use crate::kernel::ServerDeps;

enum StepOutcome {
    Succeeded(Value),
    Failed(String),
}

/// Job handler for `workflow.execute`.
///
/// Infrastructure errors (run bookkeeping writes) propagate as `Err`; action
/// failures mark the run `Failed` and return `Ok` so the queue never
/// replays a half-executed graph.
pub async fn execute_workflow(command: ExecuteWorkflowCommand, deps: &ServerDeps) -> Result<()> {
    let Some(workflow) = Workflow::find_by_id(command.workflow_id, &deps.db_pool).await? else {
        warn!(workflow_id = %command.workflow_id, "workflow gone, dropping execution");
        return Ok(());
    };

    // A pause can race an already-claimed execution
    if workflow.status != WorkflowStatus::Active {
        info!(
            workflow_id = %workflow.id,
            status = %workflow.status,
            "workflow is not active, dropping execution"
        );
        return Ok(());
    }

    let steps = WorkflowStep::find_for_workflow(workflow.id, &deps.db_pool).await?;
    let connections = StepConnection::find_for_workflow(workflow.id, &deps.db_pool).await?;
    let mappings = FieldMapping::find_for_workflow(workflow.id, &deps.db_pool).await?;

    let Some(trigger) = steps.iter().find(|s| s.kind == StepKind::Trigger) else {
        warn!(workflow_id = %workflow.id, "stored graph has no trigger step, dropping execution");
        return Ok(());
    };

    let run = WorkflowRun::new(workflow.id, workflow.version, command.payload.clone())
        .insert(&deps.db_pool)
        .await?;
    info!(
        run_id = %run.id,
        workflow_id = %workflow.id,
        trigger = %command.trigger_type,
        "workflow run started"
    );

    let step_by_id: HashMap<StepId, &WorkflowStep> = steps.iter().map(|s| (s.id, s)).collect();

    // SQL returns edges ordered by (from, position); grouping preserves that
    let mut outgoing: HashMap<StepId, Vec<&StepConnection>> = HashMap::new();
    for conn in &connections {
        outgoing.entry(conn.from_step_id).or_default().push(conn);
    }

    let registry = ActionRegistry::builtin();
    let mut context = json!({ "trigger": command.payload, "steps": {} });
    let mut visited: HashSet<StepId> = HashSet::new();
    visited.insert(trigger.id);

    // Depth-first: edges are pushed in reverse position order so the
    // first-position branch runs (and finishes) before its siblings
    let mut stack: Vec<&StepConnection> = Vec::new();
    push_outgoing(&mut stack, trigger.id, &outgoing);

    while let Some(edge) = stack.pop() {
        if let Some(raw) = &edge.condition {
            match Condition::parse(raw) {
                Ok(condition) => {
                    if !condition.evaluate(&context) {
                        continue;
                    }
                }
                Err(e) => {
                    warn!(
                        run_id = %run.id,
                        connection_id = %edge.id,
                        error = %e,
                        "stored edge condition no longer parses, skipping branch"
                    );
                    continue;
                }
            }
        }

        let Some(step) = step_by_id.get(&edge.to_step_id).copied() else {
            continue;
        };
        // Diamonds execute once; edges back into the trigger do nothing
        if !visited.insert(step.id) || step.kind != StepKind::Action {
            continue;
        }

        let step_mappings: Vec<FieldMapping> = mappings
            .iter()
            .filter(|m| m.step_id == step.id)
            .cloned()
            .collect();

        match run_action_step(step, &step_mappings, &context, &registry, deps, &run).await? {
            StepOutcome::Succeeded(output) => {
                context["steps"][step.id.to_string()] = output;
                push_outgoing(&mut stack, step.id, &outgoing);
            }
            StepOutcome::Failed(error) => {
                WorkflowRun::mark_failed(run.id, &error, &deps.db_pool).await?;
                warn!(run_id = %run.id, error = %error, "workflow run failed");
                return Ok(());
            }
        }
    }

    WorkflowRun::mark_succeeded(run.id, &deps.db_pool).await?;
    info!(run_id = %run.id, "workflow run succeeded");
    Ok(())
}

fn push_outgoing<'a>(
    stack: &mut Vec<&'a StepConnection>,
    from: StepId,
    outgoing: &HashMap<StepId, Vec<&'a StepConnection>>,
) {
    if let Some(edges) = outgoing.get(&from) {
        for edge in edges.iter().rev() {
            stack.push(edge);
        }
    }
}

/// Execute one action step and persist its record.
/// Mapping failures, unknown handlers and handler errors all land in the
/// step record; only the bookkeeping insert itself can return `Err`.
async fn run_action_step(
    step: &WorkflowStep,
    mappings: &[FieldMapping],
    context: &Value,
    registry: &ActionRegistry,
    deps: &ServerDeps,
    run: &WorkflowRun,
) -> Result<StepOutcome> {
    let started_at = Utc::now();

    let (status, input, output, error) = match apply_mappings(mappings, context) {
        Err(e) => (
            RunStatus::Failed,
            Value::Object(Default::default()),
            Value::Null,
            Some(e.to_string()),
        ),
        Ok(input) => match registry.get(&step.step_type) {
            None => (
                RunStatus::Failed,
                input,
                Value::Null,
                Some(format!("unknown action type '{}'", step.step_type)),
            ),
            Some(handler) => match handler.execute(&input, &step.config, deps).await {
                Ok(output) => (RunStatus::Succeeded, input, output, None),
                Err(e) => (RunStatus::Failed, input, Value::Null, Some(e.to_string())),
            },
        },
    };

    StepRun {
        id: StepRunId::new(),
        run_id: run.id,
        step_id: step.id,
        step_type: step.step_type.clone(),
        status,
        input,
        output: output.clone(),
        error: error.clone(),
        started_at,
        finished_at: Utc::now(),
    }
    .insert(&deps.db_pool)
    .await?;

    Ok(match error {
        None => StepOutcome::Succeeded(output),
        Some(e) => StepOutcome::Failed(format!("step '{}': {}", step.name, e)),
    })
}
