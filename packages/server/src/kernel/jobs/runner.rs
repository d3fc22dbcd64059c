//! Background worker loop.
//!
//! One runner per process polls the queue, executes whatever it claims
//! through the registry, and reports the outcome back so the queue can
//! retry or dead-letter failures.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::ErrorKind;
use super::queue::{ClaimedJob, JobQueue};
use super::registry::SharedJobRegistry;
use crate::kernel::ServerDeps;

/// Jobs leased per poll.
const CLAIM_BATCH: i64 = 10;
/// Sleep when a poll finds nothing.
const IDLE_WAIT: Duration = Duration::from_secs(5);
/// Sleep after a failed poll.
const POLL_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Message fragments that mark a failure as permanent.
const PERMANENT_ERROR_MARKERS: [&str; 7] = [
    "not found",
    "invalid",
    "permission denied",
    "unauthorized",
    "forbidden",
    "deserialize",
    "parse",
];

pub struct JobRunner {
    queue: Arc<dyn JobQueue>,
    registry: SharedJobRegistry,
    deps: Arc<ServerDeps>,
    worker_id: String,
}

impl JobRunner {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
    ) -> Self {
        Self {
            queue,
            registry,
            deps,
            worker_id: format!("worker-{}", Uuid::now_v7()),
        }
    }

    /// Poll and execute until the process exits.
    pub async fn run(self) -> Result<()> {
        info!(worker_id = %self.worker_id, batch = CLAIM_BATCH, "job runner started");

        loop {
            let batch = match self.queue.claim(&self.worker_id, CLAIM_BATCH).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "claiming jobs failed");
                    tokio::time::sleep(POLL_RETRY_WAIT).await;
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::time::sleep(IDLE_WAIT).await;
                continue;
            }

            debug!(count = batch.len(), "claimed a batch");
            for job in batch {
                self.run_one(job).await;
            }
        }
    }

    /// Execute one claimed job and record the outcome. Never propagates;
    /// a failing job must not take the runner down.
    async fn run_one(&self, job: ClaimedJob) {
        let job_type = job.command_type().to_string();

        let report = match self.registry.execute(&job, self.deps.clone()).await {
            Ok(()) => {
                info!(job_id = %job.id, job_type = %job_type, "job succeeded");
                self.queue.mark_succeeded(job.id).await
            }
            Err(e) => {
                let kind = error_kind_of(&e);
                warn!(
                    job_id = %job.id,
                    job_type = %job_type,
                    error = %e,
                    kind = ?kind,
                    "job failed"
                );
                self.queue.mark_failed(job.id, &e.to_string(), kind).await
            }
        };

        if let Err(e) = report {
            error!(job_id = %job.id, error = %e, "recording job outcome failed");
        }
    }
}

/// Decide whether a failed job is worth retrying.
///
/// Handlers return anyhow errors, so classification keys off the message
/// text: validation and not-found failures never heal on retry, everything
/// else is treated as transient.
fn error_kind_of(error: &anyhow::Error) -> ErrorKind {
    let text = error.to_string().to_lowercase();
    if PERMANENT_ERROR_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
    {
        ErrorKind::NonRetryable
    } else {
        ErrorKind::Retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_retry() {
        let e = anyhow::anyhow!("connection reset by peer");
        assert_eq!(error_kind_of(&e), ErrorKind::Retryable);
    }

    #[test]
    fn test_not_found_is_permanent() {
        let e = anyhow::anyhow!("Lead not found: 0198");
        assert_eq!(error_kind_of(&e), ErrorKind::NonRetryable);
    }

    #[test]
    fn test_bad_payloads_are_permanent() {
        let e = anyhow::anyhow!("cannot deserialize workflow.execute payload: missing field");
        assert_eq!(error_kind_of(&e), ErrorKind::NonRetryable);
    }
}
