//! Fan-out from domain events to workflow executions.
//!
//! Domain code reports facts ("a lead was created") as a [`TriggerEvent`];
//! the dispatcher finds every Active workflow whose trigger step matches and
//! enqueues one `workflow.execute` job per workflow. Optional trigger
//! filters are evaluated here, against the raw payload, so a workflow that
//! only cares about qualified leads never costs a job for the rest.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domains::leads::events::LeadEvent;
use crate::domains::workflows::commands::ExecuteWorkflowCommand;
use crate::domains::workflows::engine::condition::Condition;
use crate::domains::workflows::models::WorkflowStep;
use crate::kernel::ServerDeps;

/// A trigger occurrence, normalized across sources.
///
/// `event_id` keys the execute job's idempotency: the same event re-reported
/// to the same workflow never runs twice. Lead events reuse their activity
/// id, webhook imports derive one from the leadgen id, schedule ticks mint a
/// fresh one per fire.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub trigger_type: String,
    pub event_id: Uuid,
    pub payload: Value,
}

impl TriggerEvent {
    pub fn new(trigger_type: impl Into<String>, event_id: Uuid, payload: Value) -> Self {
        TriggerEvent {
            trigger_type: trigger_type.into(),
            event_id,
            payload,
        }
    }
}

/// Dispatch a lead domain event to matching workflows.
/// Returns how many executions were enqueued.
pub async fn dispatch_lead_event(event: &LeadEvent, deps: &ServerDeps) -> Result<usize> {
    let trigger = TriggerEvent::new(
        event.trigger_type(),
        event.activity_id().into_uuid(),
        event.trigger_payload(),
    );
    dispatch_trigger(&trigger, deps).await
}

/// Core dispatch: match Active workflow triggers, apply filters, enqueue.
pub async fn dispatch_trigger(event: &TriggerEvent, deps: &ServerDeps) -> Result<usize> {
    let triggers = WorkflowStep::find_active_triggers(&event.trigger_type, &deps.db_pool).await?;

    let mut enqueued = 0;
    for step in triggers {
        if let Some(filter) = step.config.get("filter") {
            match Condition::parse(filter) {
                Ok(condition) => {
                    if !condition.evaluate(&event.payload) {
                        debug!(
                            workflow_id = %step.workflow_id,
                            trigger = %event.trigger_type,
                            "trigger filter did not match, skipping"
                        );
                        continue;
                    }
                }
                Err(e) => {
                    // Stored graphs are validated, so this means the rules
                    // changed under an old graph. Skip rather than guess.
                    warn!(
                        workflow_id = %step.workflow_id,
                        error = %e,
                        "stored trigger filter no longer parses, skipping"
                    );
                    continue;
                }
            }
        }

        let result = deps
            .job_queue
            .enqueue(ExecuteWorkflowCommand {
                workflow_id: step.workflow_id,
                trigger_type: event.trigger_type.clone(),
                event_id: event.event_id,
                payload: event.payload.clone(),
            })
            .await?;

        if result.is_created() {
            enqueued += 1;
        } else {
            debug!(
                workflow_id = %step.workflow_id,
                event_id = %event.event_id,
                "execution already enqueued for this event"
            );
        }
    }

    Ok(enqueued)
}
