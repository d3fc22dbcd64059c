//! Background job handlers owned by the workflows domain.

use crate::domains::workflows::commands::ExecuteWorkflowCommand;
use crate::domains::workflows::engine::executor;

pub fn register_workflow_jobs(registry: &mut crate::kernel::jobs::JobRegistry) {
    registry.register::<ExecuteWorkflowCommand, _, _>(
        ExecuteWorkflowCommand::JOB_TYPE,
        |command, deps| async move { executor::execute_workflow(command, &deps).await },
    );
}
