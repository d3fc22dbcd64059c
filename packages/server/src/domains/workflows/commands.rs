//! Job commands owned by the workflows domain.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::common::WorkflowId;
use crate::kernel::jobs::CommandMeta;

/// Execute one workflow against one trigger event.
///
/// The idempotency key pairs the workflow with the event, so a re-dispatched
/// event (webhook redelivery, dispatcher retry) cannot start a second run of
/// the same workflow. Retries are disabled: a failed run is inspected and
/// re-fired from the run history, never replayed blindly by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteWorkflowCommand {
    pub workflow_id: WorkflowId,
    pub trigger_type: String,
    pub event_id: Uuid,
    pub payload: Value,
}

impl ExecuteWorkflowCommand {
    pub const JOB_TYPE: &'static str = "workflow.execute";
}

impl CommandMeta for ExecuteWorkflowCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.workflow_id, self.event_id))
    }

    fn max_retries(&self) -> i32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_idempotency_key_pins_workflow_and_event() {
        let workflow_id = WorkflowId::new();
        let event_id = Uuid::now_v7();
        let command = ExecuteWorkflowCommand {
            workflow_id,
            trigger_type: "trigger.lead_created".to_string(),
            event_id,
            payload: json!({}),
        };

        assert_eq!(
            command.idempotency_key(),
            Some(format!("{}:{}", workflow_id, event_id))
        );
        assert_eq!(command.command_type(), "workflow.execute");
        assert_eq!(command.max_retries(), 0);
    }
}
