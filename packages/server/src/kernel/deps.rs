//! Central dependency container handed to domain actions and job handlers.
//!
//! External services sit behind trait objects so tests can substitute fakes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use twilio::TwilioService;

use crate::common::auth::{AuthError, HasAuthContext};
use crate::common::RoleId;
use crate::domains::auth::JwtService;
use crate::kernel::cache::CacheService;
use crate::kernel::jobs::JobQueue;
use crate::kernel::scheduled_tasks::ScheduleRegistry;
use crate::kernel::{BaseCalendarClient, BaseFacebookClient, BaseSmsService};

/// [`BaseSmsService`] backed by the Twilio REST API.
pub struct TwilioAdapter(pub Arc<TwilioService>);

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseSmsService for TwilioAdapter {
    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        self.0.send_sms(to, body).await?;
        Ok(())
    }
}

/// Everything a request handler or job needs to touch the outside world.
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    /// In-process cache with tag-based invalidation
    pub cache: CacheService,
    /// Background job queue
    pub job_queue: Arc<dyn JobQueue>,
    pub sms: Arc<dyn BaseSmsService>,
    pub facebook: Arc<dyn BaseFacebookClient>,
    pub calendar: Arc<dyn BaseCalendarClient>,
    /// JWT service for token creation
    pub jwt_service: Arc<JwtService>,
    /// Dynamic cron registrations for workflow schedule triggers
    pub schedule_registry: ScheduleRegistry,
    /// Base URL this server is reachable at (used for OAuth redirect URIs)
    pub public_base_url: String,
    pub facebook_app_id: String,
    pub facebook_app_secret: String,
    pub facebook_webhook_verify_token: String,
    pub google_client_id: String,
}

impl ServerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        cache: CacheService,
        job_queue: Arc<dyn JobQueue>,
        sms: Arc<dyn BaseSmsService>,
        facebook: Arc<dyn BaseFacebookClient>,
        calendar: Arc<dyn BaseCalendarClient>,
        jwt_service: Arc<JwtService>,
        schedule_registry: ScheduleRegistry,
        public_base_url: String,
        facebook_app_id: String,
        facebook_app_secret: String,
        facebook_webhook_verify_token: String,
        google_client_id: String,
    ) -> Self {
        Self {
            db_pool,
            cache,
            job_queue,
            sms,
            facebook,
            calendar,
            jwt_service,
            schedule_registry,
            public_base_url,
            facebook_app_id,
            facebook_app_secret,
            facebook_webhook_verify_token,
            google_client_id,
        }
    }

    /// Cache key for a role's permission keys.
    pub fn role_perms_cache_key(role_id: RoleId) -> String {
        format!("role-perms:{}", role_id)
    }
}

/// Permission lookups go through the cache under the `rbac` tag so that
/// role changes invalidate them immediately.
#[async_trait]
impl HasAuthContext for ServerDeps {
    async fn role_permission_keys(&self, role_id: RoleId) -> Result<Vec<String>, AuthError> {
        let cache_key = Self::role_perms_cache_key(role_id);

        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Ok(keys) = serde_json::from_value::<Vec<String>>(cached) {
                return Ok(keys);
            }
        }

        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.key
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db_pool)
        .await?;

        self.cache
            .put(
                &cache_key,
                serde_json::json!(keys),
                std::time::Duration::from_secs(300),
                &["rbac"],
            )
            .await;

        Ok(keys)
    }
}
