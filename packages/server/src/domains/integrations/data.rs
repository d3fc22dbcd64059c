use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domains::integrations::models::{Integration, IntegrationProvider, IntegrationStatus};

/// What the API exposes about a provider connection. Credentials never
/// appear here; `token_expires_at` is the only thing read out of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSummary {
    pub provider: IntegrationProvider,
    pub name: String,
    pub status: IntegrationStatus,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub health: Value,
    pub sync_stats: Value,
    pub connected_at: Option<DateTime<Utc>>,
}

impl IntegrationSummary {
    pub fn from_integration(integration: &Integration) -> Self {
        IntegrationSummary {
            provider: integration.provider,
            name: integration.name.clone(),
            status: integration.status,
            token_expires_at: integration.token_expires_at(),
            health: integration.health.clone(),
            sync_stats: integration.sync_stats.clone(),
            connected_at: Some(integration.created_at),
        }
    }

    /// Placeholder row for a provider that was never connected.
    pub fn not_configured(provider: IntegrationProvider) -> Self {
        let name = match provider {
            IntegrationProvider::Facebook => "Facebook Lead Ads",
            IntegrationProvider::GoogleCalendar => "Google Calendar",
        };

        IntegrationSummary {
            provider,
            name: name.to_string(),
            status: IntegrationStatus::Disconnected,
            token_expires_at: None,
            health: json!({}),
            sync_stats: json!({}),
            connected_at: None,
        }
    }
}
