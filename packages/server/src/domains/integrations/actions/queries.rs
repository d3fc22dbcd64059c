use std::time::Duration;

use anyhow::Result;

use crate::domains::integrations::data::IntegrationSummary;
use crate::domains::integrations::effects::INTEGRATIONS_CACHE_TAG;
use crate::domains::integrations::models::{Integration, IntegrationProvider};
use crate::kernel::ServerDeps;

const SUMMARY_CACHE_KEY: &str = "integrations:summary";
const SUMMARY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Status summary of every provider, configured or not. Cached under the
/// `integrations` tag; integration events invalidate it.
pub async fn list_integrations(deps: &ServerDeps) -> Result<Vec<IntegrationSummary>> {
    if let Some(cached) = deps.cache.get(SUMMARY_CACHE_KEY).await {
        if let Ok(summaries) = serde_json::from_value::<Vec<IntegrationSummary>>(cached) {
            return Ok(summaries);
        }
    }

    let rows = Integration::find_all(&deps.db_pool).await?;
    let summaries: Vec<IntegrationSummary> = [
        IntegrationProvider::Facebook,
        IntegrationProvider::GoogleCalendar,
    ]
    .iter()
    .map(|provider| {
        rows.iter()
            .find(|row| row.provider == *provider)
            .map(IntegrationSummary::from_integration)
            .unwrap_or_else(|| IntegrationSummary::not_configured(*provider))
    })
    .collect();

    deps.cache
        .put(
            SUMMARY_CACHE_KEY,
            serde_json::to_value(&summaries)?,
            SUMMARY_CACHE_TTL,
            &[INTEGRATIONS_CACHE_TAG],
        )
        .await;

    Ok(summaries)
}

/// Summary for a single provider, bypassing the cache.
pub async fn get_integration_summary(
    provider: IntegrationProvider,
    deps: &ServerDeps,
) -> Result<IntegrationSummary> {
    let summary = Integration::find_by_provider(provider, &deps.db_pool)
        .await?
        .map(|row| IntegrationSummary::from_integration(&row))
        .unwrap_or_else(|| IntegrationSummary::not_configured(provider));

    Ok(summary)
}
