//! Fixed cron upkeep plus the dynamic schedule registry.
//!
//! Four periodic tasks run on fixed schedules:
//! - Hourly integration token expiry checks
//! - Expired OTP purging
//! - Cache sweeping
//! - Stale workflow run cleanup
//!
//! [`ScheduleRegistry`] holds the dynamic entries owned by workflow
//! schedule triggers; those come and go at runtime as workflows are
//! activated and deactivated.
//!
//! # Architecture
//!
//! Scheduled tasks live outside the job queue. A fire either runs a small
//! maintenance query inline or enqueues a job for the runner to pick up:
//!
//! ```text
//! Scheduler (every hour)
//!     |
//!     +--> check_expiring_tokens()
//!             +--> For each integration -> refresh or mark token_expired
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use uuid::Uuid;

use crate::domains::auth::models::otp::Otp;
use crate::domains::integrations::actions::token_checker;
use crate::domains::workflows::models::run::WorkflowRun;
use crate::kernel::jobs::{CommandMeta, JobQueue};
use crate::kernel::ServerDeps;

/// How long a workflow run may sit in `running` before the sweeper fails it.
const STALE_RUN_MINUTES: i64 = 30;

/// Start all fixed scheduled tasks.
///
/// The caller creates the `JobScheduler` (so a [`ScheduleRegistry`] can share
/// it) and receives it back running.
pub async fn start_scheduler(scheduler: JobScheduler, deps: Arc<ServerDeps>) -> Result<JobScheduler> {
    // Integration token expiry check - runs every hour
    let token_deps = deps.clone();
    let token_job = CronJob::new_async("0 0 * * * *", move |_uuid, _lock| {
        let deps = token_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_token_expiry_check(&deps).await {
                tracing::error!("Token expiry check failed: {}", e);
            }
        })
    })?;
    scheduler.add(token_job).await?;

    // OTP purge - runs every 15 minutes
    let otp_deps = deps.clone();
    let otp_job = CronJob::new_async("0 */15 * * * *", move |_uuid, _lock| {
        let deps = otp_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_otp_purge(&deps).await {
                tracing::error!("OTP purge failed: {}", e);
            }
        })
    })?;
    scheduler.add(otp_job).await?;

    // Cache sweep - runs every 5 minutes
    let cache_deps = deps.clone();
    let cache_job = CronJob::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let deps = cache_deps.clone();
        Box::pin(async move {
            let evicted = deps.cache.sweep().await;
            if evicted > 0 {
                tracing::debug!("Cache sweep evicted {} expired entries", evicted);
            }
        })
    })?;
    scheduler.add(cache_job).await?;

    // Stale workflow run sweep - runs every 10 minutes
    let run_deps = deps.clone();
    let run_job = CronJob::new_async("0 */10 * * * *", move |_uuid, _lock| {
        let deps = run_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_stale_run_sweep(&deps).await {
                tracing::error!("Stale run sweep failed: {}", e);
            }
        })
    })?;
    scheduler.add(run_job).await?;

    scheduler.start().await?;

    tracing::info!(
        "Scheduled tasks started (token check hourly, OTP purge every 15m, cache sweep every 5m, stale run sweep every 10m)"
    );
    Ok(scheduler)
}

/// Run the hourly integration token expiry check.
///
/// Finds integrations whose tokens expire within 24 hours and either
/// refreshes them or marks them as token_expired.
async fn run_token_expiry_check(deps: &Arc<ServerDeps>) -> Result<()> {
    tracing::info!("Running integration token expiry check");

    let checked = token_checker::check_expiring_tokens(deps).await?;

    if checked > 0 {
        tracing::info!("Token expiry check handled {} integrations", checked);
    }

    Ok(())
}

/// Purge expired and consumed OTP rows.
async fn run_otp_purge(deps: &Arc<ServerDeps>) -> Result<()> {
    let purged = Otp::purge_expired(&deps.db_pool).await?;

    if purged > 0 {
        tracing::info!("Purged {} expired OTP rows", purged);
    }

    Ok(())
}

/// Fail workflow runs that have been running for too long.
///
/// A run left in `running` past the threshold means its job died without
/// marking the run; the sweeper closes it so run listings stay truthful.
async fn run_stale_run_sweep(deps: &Arc<ServerDeps>) -> Result<()> {
    let failed = WorkflowRun::fail_stale_runs(STALE_RUN_MINUTES, &deps.db_pool).await?;

    if failed > 0 {
        tracing::warn!("Marked {} abandoned workflow runs as failed", failed);
    }

    Ok(())
}

/// Dynamic cron registrations keyed by owner ID.
///
/// Workflow schedule triggers register here when a workflow is activated
/// and unregister when it is deactivated or deleted. Each fire builds a
/// fresh command (so per-occurrence idempotency keys work) and enqueues it.
#[derive(Clone)]
pub struct ScheduleRegistry {
    scheduler: JobScheduler,
    job_queue: Arc<dyn JobQueue>,
    entries: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl ScheduleRegistry {
    pub fn new(scheduler: JobScheduler, job_queue: Arc<dyn JobQueue>) -> Self {
        Self {
            scheduler,
            job_queue,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a cron entry for `key`, replacing any existing entry.
    ///
    /// `make_command` runs on every fire so the command can carry
    /// occurrence-specific data such as an idempotency key.
    pub async fn register<C, F>(&self, key: Uuid, cron: &str, make_command: F) -> Result<()>
    where
        C: CommandMeta + Serialize + Send + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.unregister(key).await?;

        let queue = self.job_queue.clone();
        let cron_job = CronJob::new_async(cron, move |_uuid, _lock| {
            let queue = queue.clone();
            let command = make_command();
            Box::pin(async move {
                if let Err(e) = queue.enqueue(command).await {
                    tracing::error!("Failed to enqueue scheduled command: {}", e);
                }
            })
        })?;

        let cron_id = self.scheduler.add(cron_job).await?;
        self.entries.lock().await.insert(key, cron_id);

        tracing::debug!(key = %key, cron = %cron, "registered schedule");
        Ok(())
    }

    /// Remove the cron entry for `key`, if one exists.
    pub async fn unregister(&self, key: Uuid) -> Result<()> {
        let removed = self.entries.lock().await.remove(&key);
        if let Some(cron_id) = removed {
            self.scheduler.remove(&cron_id).await?;
            tracing::debug!(key = %key, "unregistered schedule");
        }
        Ok(())
    }

    pub async fn registered_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Whether `expr` parses as a cron expression the scheduler accepts.
///
/// Used by workflow validation so a bad schedule trigger is rejected at
/// save time instead of at activation.
pub fn is_valid_cron(expr: &str) -> bool {
    CronJob::new_async(expr, |_uuid, _lock| Box::pin(async {})).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_cron_accepts_six_field_expressions() {
        assert!(is_valid_cron("0 0 * * * *"));
        assert!(is_valid_cron("0 */15 * * * *"));
    }

    #[test]
    fn test_is_valid_cron_rejects_garbage() {
        assert!(!is_valid_cron("every tuesday"));
        assert!(!is_valid_cron(""));
    }

    #[tokio::test]
    async fn test_registry_register_and_unregister() {
        use crate::kernel::jobs::testing::InMemoryJobQueue;
        use serde::Deserialize;

        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct TickCommand;

        impl CommandMeta for TickCommand {
            fn command_type(&self) -> &'static str {
                "tick"
            }
        }

        let scheduler = JobScheduler::new().await.unwrap();
        let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
        let registry = ScheduleRegistry::new(scheduler, queue);

        let key = Uuid::new_v4();
        registry
            .register(key, "0 0 * * * *", || TickCommand)
            .await
            .unwrap();
        assert_eq!(registry.registered_count().await, 1);

        // Re-registering the same key replaces the entry
        registry
            .register(key, "0 30 * * * *", || TickCommand)
            .await
            .unwrap();
        assert_eq!(registry.registered_count().await, 1);

        registry.unregister(key).await.unwrap();
        assert_eq!(registry.registered_count().await, 0);
    }
}
