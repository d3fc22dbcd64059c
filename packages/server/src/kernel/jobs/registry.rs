//! Dispatch table from job type strings to typed handlers.
//!
//! Each domain registers its handlers once at startup. A claimed job's
//! payload is deserialized into the command type and handed to the matching
//! handler, so the runner never sees concrete command types.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

use super::queue::ClaimedJob;
use crate::kernel::ServerDeps;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Handler = Box<dyn Fn(serde_json::Value, Arc<ServerDeps>) -> HandlerFuture + Send + Sync>;

/// Maps `job_type` strings to the closures that run them.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `job_type` to an async handler taking the deserialized command.
    ///
    /// Registering the same type twice replaces the earlier handler.
    pub fn register<C, F, Fut>(&mut self, job_type: &'static str, handler: F)
    where
        C: DeserializeOwned + Send + 'static,
        F: Fn(C, Arc<ServerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.handlers.insert(
            job_type,
            Box::new(move |payload, deps| {
                let handler = handler.clone();
                Box::pin(async move {
                    let command: C = serde_json::from_value(payload)
                        .map_err(|e| anyhow!("cannot deserialize {} payload: {}", job_type, e))?;
                    handler(command, deps).await
                })
            }),
        );
    }

    /// Run a claimed job through its registered handler.
    pub async fn execute(&self, job: &ClaimedJob, deps: Arc<ServerDeps>) -> Result<()> {
        let job_type = job.command_type();
        let handler = self
            .handlers
            .get(job_type)
            .ok_or_else(|| anyhow!("unknown job type: {}", job_type))?;
        let payload = job
            .job
            .args
            .clone()
            .ok_or_else(|| anyhow!("job {} carries no payload", job.id))?;

        handler(payload, deps).await
    }

    /// Job types with a handler, sorted for stable startup logs.
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

/// Registry shared with the runner.
pub type SharedJobRegistry = Arc<JobRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Noop {}

    #[test]
    fn test_registered_types_are_sorted() {
        let mut registry = JobRegistry::new();
        registry.register::<Noop, _, _>("b.second", |_command, _deps| async move { Ok(()) });
        registry.register::<Noop, _, _>("a.first", |_command, _deps| async move { Ok(()) });

        assert_eq!(registry.registered_types(), vec!["a.first", "b.second"]);
    }

    #[test]
    fn test_reregistering_replaces_the_handler() {
        let mut registry = JobRegistry::new();
        registry.register::<Noop, _, _>("a.first", |_command, _deps| async move { Ok(()) });
        registry.register::<Noop, _, _>("a.first", |_command, _deps| async move { Ok(()) });

        assert_eq!(registry.registered_types().len(), 1);
    }
}
