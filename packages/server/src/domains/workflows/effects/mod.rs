pub mod job_handlers;

pub use job_handlers::register_workflow_jobs;
