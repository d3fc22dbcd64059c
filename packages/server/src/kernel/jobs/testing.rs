//! Job testing utilities.
//!
//! Provides an in-memory `JobQueue` so dispatch logic can be unit tested
//! without a database.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobStatus};
use super::queue::{ClaimedJob, EnqueueResult, JobQueue};

/// In-memory job queue backed by a `Mutex<Vec<Job>>`.
///
/// Honors idempotency keys the same way `PostgresJobQueue` does, so
/// duplicate-suppression behavior can be asserted in unit tests.
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all jobs ever enqueued.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    /// Jobs of a given type, in enqueue order.
    pub fn jobs_of_type(&self, job_type: &str) -> Vec<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.job_type == job_type)
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue_job(&self, job: Job) -> Result<EnqueueResult> {
        let mut jobs = self.jobs.lock().unwrap();

        if let Some(key) = &job.idempotency_key {
            let existing = jobs.iter().find(|j| {
                j.idempotency_key.as_ref() == Some(key)
                    && matches!(j.status, JobStatus::Pending | JobStatus::Running)
            });
            if let Some(existing) = existing {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let id = job.id;
        jobs.push(job);
        Ok(EnqueueResult::Created(id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut claimed = Vec::new();

        for job in jobs.iter_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            if job.is_ready() {
                job.status = JobStatus::Running;
                job.worker_id = Some(worker_id.to_string());
                job.last_run_at = Some(Utc::now());
                claimed.push(ClaimedJob {
                    id: job.id,
                    job: job.clone(),
                });
            }
        }

        Ok(claimed)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Succeeded;
        }
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();

        let retry = if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.error_message = Some(error.to_string());
            job.error_kind = Some(kind);

            if kind.should_retry() && job.retry_count < job.max_retries {
                job.status = JobStatus::Failed;
                Some(job.create_retry(Utc::now()))
            } else {
                job.status = JobStatus::DeadLetter;
                job.dead_lettered_at = Some(Utc::now());
                None
            }
        } else {
            None
        };

        if let Some(retry) = retry {
            jobs.push(retry);
        }
        Ok(())
    }

    async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == JobStatus::Pending)
        {
            job.status = JobStatus::Cancelled;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kernel::jobs::{CommandMeta, JobPriority};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct PingCommand {
        pub target: String,
    }

    impl CommandMeta for PingCommand {
        fn command_type(&self) -> &'static str {
            "ping"
        }

        fn idempotency_key(&self) -> Option<String> {
            Some(format!("ping:{}", self.target))
        }

        fn priority(&self) -> JobPriority {
            JobPriority::Low
        }
    }

    #[tokio::test]
    async fn test_enqueue_suppresses_duplicates() {
        let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());

        let first = queue
            .enqueue(PingCommand {
                target: "a".to_string(),
            })
            .await
            .unwrap();
        let second = queue
            .enqueue(PingCommand {
                target: "a".to_string(),
            })
            .await
            .unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.job_id(), second.job_id());
    }

    #[tokio::test]
    async fn test_claim_then_succeed() {
        let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());

        queue
            .enqueue(PingCommand {
                target: "b".to_string(),
            })
            .await
            .unwrap();

        let claimed = queue.claim("worker-1", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);

        let command: PingCommand = claimed[0].deserialize().unwrap();
        assert_eq!(command.target, "b");

        queue.mark_succeeded(claimed[0].id).await.unwrap();
        assert!(queue.claim("worker-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_failed_schedules_retry_then_dead_letters() {
        let in_memory = Arc::new(InMemoryJobQueue::new());
        let queue: Arc<dyn JobQueue> = in_memory.clone();

        let job = Job::builder()
            .job_type("ping")
            .args(serde_json::json!({ "target": "c" }))
            .max_retries(1)
            .build();
        queue.enqueue_job(job).await.unwrap();

        let claimed = queue.claim("worker-1", 1).await.unwrap();
        queue
            .mark_failed(claimed[0].id, "connection timeout", ErrorKind::Retryable)
            .await
            .unwrap();

        // Retry row exists, original is failed
        let retry = queue.claim("worker-1", 1).await.unwrap();
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].job.attempt, 2);

        queue
            .mark_failed(retry[0].id, "connection timeout", ErrorKind::Retryable)
            .await
            .unwrap();

        let dead = in_memory
            .jobs()
            .into_iter()
            .filter(|j| j.status == JobStatus::DeadLetter)
            .count();
        assert_eq!(dead, 1);
        assert_eq!(in_memory.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_only_touches_pending_jobs() {
        let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());

        let pending = queue
            .enqueue(PingCommand {
                target: "d".to_string(),
            })
            .await
            .unwrap();
        assert!(queue.cancel(pending.job_id()).await.unwrap());

        // Cancelled jobs never get claimed
        assert!(queue.claim("worker-1", 10).await.unwrap().is_empty());

        let running = queue
            .enqueue(PingCommand {
                target: "e".to_string(),
            })
            .await
            .unwrap();
        queue.claim("worker-1", 10).await.unwrap();
        assert!(!queue.cancel(running.job_id()).await.unwrap());
    }
}
