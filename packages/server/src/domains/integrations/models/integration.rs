use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::common::IntegrationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "integration_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntegrationProvider {
    Facebook,
    GoogleCalendar,
}

impl std::fmt::Display for IntegrationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntegrationProvider::Facebook => "facebook",
            IntegrationProvider::GoogleCalendar => "google_calendar",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "integration_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Connected,
    Disconnected,
    TokenExpired,
    Error,
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntegrationStatus::Connected => "connected",
            IntegrationStatus::Disconnected => "disconnected",
            IntegrationStatus::TokenExpired => "token_expired",
            IntegrationStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A third-party provider connection. One row per provider.
///
/// `credentials` holds the tokens (`access_token`, `expires_at`,
/// `refresh_token?`, plus the page fields for Facebook) and never leaves the
/// server; the struct deliberately does not implement `Serialize`, so read
/// endpoints must go through the summary type. `health` keeps a capped list
/// of recent errors, `sync_stats` counts what came through.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Integration {
    pub id: IntegrationId,
    pub provider: IntegrationProvider,
    pub name: String,
    pub status: IntegrationStatus,
    pub credentials: Value,
    pub settings: Value,
    pub health: Value,
    pub sync_stats: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub async fn find_by_provider(
        provider: IntegrationProvider,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM integrations WHERE provider = $1")
            .bind(provider)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM integrations ORDER BY provider")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Create or replace the provider's connection after a successful OAuth
    /// exchange. Health and sync stats reset with the fresh credentials.
    pub async fn upsert_connected(
        provider: IntegrationProvider,
        name: &str,
        credentials: Value,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO integrations (
                id, provider, name, status, credentials, settings, health, sync_stats,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, 'connected', $4, '{}'::jsonb,
                jsonb_build_object('status', 'ok', 'checked_at', to_jsonb(NOW()), 'recent_errors', '[]'::jsonb),
                jsonb_build_object('leads_imported', 0, 'last_sync_at', NULL, 'last_error', NULL),
                NOW(), NOW()
            )
            ON CONFLICT (provider) DO UPDATE SET
                name = EXCLUDED.name,
                status = 'connected',
                credentials = EXCLUDED.credentials,
                health = EXCLUDED.health,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(IntegrationId::new())
        .bind(provider)
        .bind(name)
        .bind(credentials)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_status(
        id: IntegrationId,
        status: IntegrationStatus,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE integrations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Swap in refreshed credentials (Google token refresh)
    pub async fn update_credentials(
        id: IntegrationId,
        credentials: Value,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE integrations
             SET credentials = $2, status = 'connected', updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(credentials)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Prepend an error to `health.recent_errors`, keeping the newest 10
    pub async fn record_health_error(
        id: IntegrationId,
        message: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE integrations
            SET health = jsonb_build_object(
                    'status', 'error',
                    'checked_at', to_jsonb(NOW()),
                    'recent_errors', jsonb_path_query_array(
                        jsonb_build_array(jsonb_build_object('message', $2::text, 'at', to_jsonb(NOW())))
                            || COALESCE(health->'recent_errors', '[]'::jsonb),
                        '$[0 to 9]'
                    )
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(message)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Mark the health snapshot clean without touching the error history
    pub async fn record_health_ok(id: IntegrationId, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE integrations
            SET health = jsonb_set(
                    jsonb_set(health, '{status}', '"ok"'),
                    '{checked_at}', to_jsonb(NOW())
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Count one imported lead into `sync_stats`
    pub async fn record_import_success(id: IntegrationId, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE integrations
            SET sync_stats = jsonb_build_object(
                    'leads_imported', COALESCE((sync_stats->>'leads_imported')::bigint, 0) + 1,
                    'last_sync_at', to_jsonb(NOW()),
                    'last_error', NULL
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Record a failed import in both `sync_stats` and the health history
    pub async fn record_import_failure(
        id: IntegrationId,
        message: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE integrations
            SET sync_stats = jsonb_set(sync_stats, '{last_error}', to_jsonb($2::text)),
                health = jsonb_build_object(
                    'status', 'error',
                    'checked_at', to_jsonb(NOW()),
                    'recent_errors', jsonb_path_query_array(
                        jsonb_build_array(jsonb_build_object('message', $2::text, 'at', to_jsonb(NOW())))
                            || COALESCE(health->'recent_errors', '[]'::jsonb),
                        '$[0 to 9]'
                    )
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(message)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Connected integrations whose access token expires within the window.
    /// `credentials.expires_at` is an RFC 3339 timestamp.
    pub async fn find_with_expiring_tokens(
        within_hours: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM integrations
            WHERE status = 'connected'
              AND credentials->>'expires_at' IS NOT NULL
              AND (credentials->>'expires_at')::timestamptz < NOW() + ($1 || ' hours')::INTERVAL
            ORDER BY provider
            "#,
        )
        .bind(within_hours.to_string())
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The stored access token, when present
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.get("access_token").and_then(Value::as_str)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.credentials.get("refresh_token").and_then(Value::as_str)
    }

    /// When the access token expires, parsed from the credentials blob
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.credentials
            .get("expires_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Credentials blob for a token set, preserving any refresh token
    /// already on file when the refresh response omits one.
    pub fn merged_google_credentials(
        &self,
        access_token: &str,
        expires_at: DateTime<Utc>,
        new_refresh_token: Option<&str>,
    ) -> Value {
        json!({
            "access_token": access_token,
            "expires_at": expires_at.to_rfc3339(),
            "refresh_token": new_refresh_token.or_else(|| self.refresh_token()),
        })
    }
}
