//! Actions are async functions called directly from the REST handlers.

mod mutations;
mod queries;

pub use mutations::{
    activate_workflow, archive_workflow, create_workflow, pause_workflow,
    register_active_schedules, update_workflow, ActivateWorkflowResult, WorkflowSaveResult,
};
pub use queries::{get_run, get_workflow, list_runs, list_workflows};
