//! Background job infrastructure.
//!
//! Commands are serialized into the `jobs` table by [`JobQueue`], claimed
//! under a lease by [`JobRunner`], and dispatched through [`JobRegistry`]
//! to the owning domain's handler. Business logic stays in the domains;
//! this module only moves jobs around.

mod job;
mod queue;
mod registry;
mod runner;
pub mod testing;

pub use job::{ErrorKind, Job, JobPriority, JobStatus};
pub use queue::{ClaimedJob, CommandMeta, EnqueueResult, JobQueue, PostgresJobQueue};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use runner::JobRunner;
