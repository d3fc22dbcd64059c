pub mod connection;
pub mod mapping;
pub mod run;
pub mod step;
pub mod workflow;

pub use connection::StepConnection;
pub use mapping::FieldMapping;
pub use run::{RunStatus, StepRun, WorkflowRun};
pub use step::{StepKind, WorkflowStep};
pub use workflow::{Workflow, WorkflowStatus};
