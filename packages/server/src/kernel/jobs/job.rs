//! Persistent job rows.
//!
//! A job is one attempt at running a serialized command. Retries are fresh
//! rows linked through `root_job_id`, so every attempt keeps its own error
//! state and timing.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLetter,
    Cancelled,
}

/// Claim order follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_priority", rename_all = "snake_case")]
pub enum JobPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    Retryable,
    NonRetryable,
}

impl ErrorKind {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }
}

/// One row in the `jobs` table.
///
/// Setters go through `Into`, so nullable columns accept either a bare
/// value or an `Option` passed straight through.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,
    pub job_type: String,
    #[builder(default)]
    pub args: Option<serde_json::Value>,

    #[builder(default)]
    pub status: JobStatus,
    #[builder(default)]
    pub priority: JobPriority,

    /// NULL means eligible immediately.
    #[builder(default)]
    pub next_run_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub last_run_at: Option<DateTime<Utc>>,

    #[builder(default = 3)]
    pub max_retries: i32,
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default = 1)]
    pub attempt: i32,
    /// First attempt of the chain, NULL on first attempts.
    #[builder(default)]
    pub root_job_id: Option<Uuid>,

    #[builder(default)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub worker_id: Option<String>,

    #[builder(default)]
    pub idempotency_key: Option<String>,
    #[builder(default = 1)]
    pub command_version: i32,

    #[builder(default)]
    pub error_message: Option<String>,
    #[builder(default)]
    pub error_kind: Option<ErrorKind>,
    #[builder(default)]
    pub dead_lettered_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub dead_letter_reason: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Eligible to run now. The `retry_count` bound is inclusive because
    /// retry rows carry counts up to and including `max_retries`.
    pub fn is_ready(&self) -> bool {
        self.status == JobStatus::Pending
            && self.retry_count <= self.max_retries
            && self.next_run_at.map_or(true, |at| at <= Utc::now())
    }

    /// A fresh pending row for the next attempt. The failed row keeps its
    /// error state; `root_job_id` ties the chain back to the first attempt.
    pub fn create_retry(&self, run_at: DateTime<Utc>) -> Self {
        Job::builder()
            .job_type(self.job_type.clone())
            .args(self.args.clone())
            .priority(self.priority)
            .next_run_at(run_at)
            .max_retries(self.max_retries)
            .retry_count(self.retry_count + 1)
            .attempt(self.attempt + 1)
            .root_job_id(self.root_job_id.or(Some(self.id)))
            .idempotency_key(self.idempotency_key.clone())
            .command_version(self.command_version)
            .build()
    }

    pub async fn insert(self, db: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO jobs (
                id, job_type, args, status, priority, next_run_at, last_run_at,
                max_retries, retry_count, attempt, root_job_id, lease_expires_at,
                worker_id, idempotency_key, command_version, error_message,
                error_kind, dead_lettered_at, dead_letter_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.job_type)
        .bind(&self.args)
        .bind(self.status)
        .bind(self.priority)
        .bind(self.next_run_at)
        .bind(self.last_run_at)
        .bind(self.max_retries)
        .bind(self.retry_count)
        .bind(self.attempt)
        .bind(self.root_job_id)
        .bind(self.lease_expires_at)
        .bind(&self.worker_id)
        .bind(&self.idempotency_key)
        .bind(self.command_version)
        .bind(&self.error_message)
        .bind(self.error_kind)
        .bind(self.dead_lettered_at)
        .bind(&self.dead_letter_reason)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(db)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id(id: Uuid, db: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_one(db)
            .await?;

        Ok(row)
    }

    /// Atomically lease up to `limit` eligible rows to `worker_id`.
    ///
    /// Rows whose lease has lapsed count as eligible again, so jobs held by
    /// a crashed worker come back once the lease runs out.
    pub async fn claim_batch(
        limit: i64,
        worker_id: &str,
        lease: chrono::Duration,
        db: &PgPool,
    ) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            r#"
            WITH eligible AS (
                SELECT id FROM jobs
                WHERE (status = 'pending'
                       AND (next_run_at IS NULL OR next_run_at <= NOW())
                       AND retry_count <= max_retries)
                   OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY priority, COALESCE(next_run_at, created_at)
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs SET
                status = 'running',
                worker_id = $3,
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                last_run_at = COALESCE(last_run_at, NOW()),
                updated_at = NOW()
            WHERE id IN (SELECT id FROM eligible)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(lease.num_milliseconds().to_string())
        .bind(worker_id)
        .fetch_all(db)
        .await?;

        Ok(rows)
    }

    /// Pending rows of one type, for cancellation sweeps.
    pub async fn find_pending_by_type(job_type: &str, db: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>(
            "SELECT * FROM jobs WHERE job_type = $1 AND status = 'pending'",
        )
        .bind(job_type)
        .fetch_all(db)
        .await?;

        Ok(rows)
    }
}
