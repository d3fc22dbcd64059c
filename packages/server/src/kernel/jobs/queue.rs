//! Queueing commands for background execution.
//!
//! Domain code hands a [`CommandMeta`] value to [`JobQueue::enqueue`]; the
//! queue serializes it into a [`Job`] row for a worker to claim later. The
//! Postgres implementation leases claimed rows so two workers never run the
//! same job, and an idempotency key on the command suppresses duplicates.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobPriority};

/// How long a claimed job stays leased to its worker.
const JOB_LEASE_MS: i64 = 60_000;

/// Outcome of [`JobQueue::enqueue_job`].
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// A new row was inserted.
    Created(Uuid),
    /// An idempotency key matched a live job; nothing was inserted.
    Duplicate(Uuid),
}

impl EnqueueResult {
    /// The inserted or matched job id.
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::Created(id) | Self::Duplicate(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// A leased job handed to a worker.
#[derive(Debug)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub job: Job,
}

impl ClaimedJob {
    /// Recover the typed command from the stored payload.
    pub fn deserialize<C: DeserializeOwned>(&self) -> Result<C> {
        let payload = self
            .job
            .args
            .as_ref()
            .ok_or_else(|| anyhow!("job {} carries no payload", self.id))?;
        serde_json::from_value(payload.clone())
            .map_err(|e| anyhow!("cannot deserialize job {}: {}", self.id, e))
    }

    pub fn command_type(&self) -> &str {
        &self.job.job_type
    }
}

/// What the queue records about a command besides its payload.
pub trait CommandMeta {
    /// Routing key stored as `job_type`; the registry dispatches on it.
    fn command_type(&self) -> &'static str;

    /// Commands with equal keys collapse while one is pending or running.
    fn idempotency_key(&self) -> Option<String> {
        None
    }

    /// Bumped when the payload changes shape.
    fn command_version(&self) -> i32 {
        1
    }

    fn priority(&self) -> JobPriority {
        JobPriority::Normal
    }

    fn max_retries(&self) -> i32 {
        3
    }
}

/// Storage boundary for background jobs.
///
/// The object-safe surface works on prebuilt [`Job`] rows; domain code goes
/// through the typed [`enqueue`](Self::enqueue) helper on `dyn JobQueue`.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a row, unless its idempotency key matches a live job.
    async fn enqueue_job(&self, job: Job) -> Result<EnqueueResult>;

    /// Lease up to `limit` ready jobs to `worker_id`.
    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>>;

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()>;

    /// Record a failure. Retryable errors reschedule with backoff while
    /// attempts remain; anything else dead-letters the job.
    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()>;

    /// Cancel a pending job. Running and finished jobs are left alone;
    /// returns whether a row changed.
    async fn cancel(&self, job_id: Uuid) -> Result<bool>;
}

impl dyn JobQueue {
    /// Serialize `command` and queue it for the next available worker.
    pub async fn enqueue<C>(&self, command: C) -> Result<EnqueueResult>
    where
        C: Serialize + Send + CommandMeta,
    {
        let payload = serde_json::to_value(&command)
            .map_err(|e| anyhow!("cannot serialize {}: {}", command.command_type(), e))?;

        let job = Job::builder()
            .job_type(command.command_type())
            .args(payload)
            .priority(command.priority())
            .max_retries(command.max_retries())
            .idempotency_key(command.idempotency_key())
            .command_version(command.command_version())
            .build();

        self.enqueue_job(job).await
    }
}

/// Retry delay: 30s doubling per attempt, capped at an hour.
fn retry_backoff(attempt: i32) -> chrono::Duration {
    let exponent = attempt.clamp(0, 10) as u32;
    chrono::Duration::seconds((30_i64 << exponent).min(3_600))
}

/// The production queue. One table, `FOR UPDATE SKIP LOCKED` claiming,
/// lease-based crash recovery.
pub struct PostgresJobQueue {
    db: PgPool,
}

impl PostgresJobQueue {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_live_by_key(&self, key: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE idempotency_key = $1 AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        Ok(job)
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue_job(&self, job: Job) -> Result<EnqueueResult> {
        if let Some(key) = &job.idempotency_key {
            if let Some(live) = self.find_live_by_key(key).await? {
                return Ok(EnqueueResult::Duplicate(live.id));
            }
        }

        let inserted = job.insert(&self.db).await?;
        Ok(EnqueueResult::Created(inserted.id))
    }

    async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedJob>> {
        let lease = chrono::Duration::milliseconds(JOB_LEASE_MS);
        let jobs = Job::claim_batch(limit, worker_id, lease, &self.db).await?;

        Ok(jobs
            .into_iter()
            .map(|job| ClaimedJob { id: job.id, job })
            .collect())
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'succeeded', updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str, kind: ErrorKind) -> Result<()> {
        let job = Job::find_by_id(job_id, &self.db).await?;

        if kind.should_retry() && job.retry_count < job.max_retries {
            let run_at = Utc::now() + retry_backoff(job.attempt);
            job.create_retry(run_at).insert(&self.db).await?;

            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed', error_message = $2, error_kind = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .bind(kind)
            .execute(&self.db)
            .await?;

            return Ok(());
        }

        let reason = if kind.should_retry() {
            "max retries exceeded"
        } else {
            "non-retryable error"
        };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead_letter', error_message = $2, error_kind = $3,
                dead_lettered_at = NOW(), dead_letter_reason = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(error)
        .bind(kind)
        .bind(reason)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE jobs SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(job_id)
        .execute(&self.db)
        .await?;

        Ok(done.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_result_accessors() {
        let id = Uuid::now_v7();
        assert_eq!(EnqueueResult::Created(id).job_id(), id);
        assert_eq!(EnqueueResult::Duplicate(id).job_id(), id);
        assert!(EnqueueResult::Created(id).is_created());
        assert!(!EnqueueResult::Duplicate(id).is_created());
    }

    #[test]
    fn test_deserialize_recovers_the_payload() {
        #[derive(serde::Deserialize)]
        struct Payload {
            lead_id: Uuid,
        }

        let lead_id = Uuid::now_v7();
        let job = Job::builder()
            .job_type("workflow.execute")
            .args(serde_json::json!({ "lead_id": lead_id }))
            .build();
        let claimed = ClaimedJob { id: job.id, job };

        let payload: Payload = claimed.deserialize().unwrap();
        assert_eq!(payload.lead_id, lead_id);
        assert_eq!(claimed.command_type(), "workflow.execute");
    }

    #[test]
    fn test_deserialize_requires_a_payload() {
        let job = Job::builder().job_type("workflow.execute").build();
        let claimed = ClaimedJob { id: job.id, job };

        let result: Result<serde_json::Value> = claimed.deserialize();
        assert!(result.is_err());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1).num_seconds(), 60);
        assert_eq!(retry_backoff(2).num_seconds(), 120);
        assert_eq!(retry_backoff(3).num_seconds(), 240);
        assert_eq!(retry_backoff(10).num_seconds(), 3_600);
        assert_eq!(retry_backoff(40).num_seconds(), 3_600);
    }
}
