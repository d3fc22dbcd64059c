use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::domains::integrations::effects;
use crate::domains::integrations::events::IntegrationEvent;
use crate::domains::integrations::models::{Integration, IntegrationProvider, IntegrationStatus};
use crate::kernel::ServerDeps;

/// Tokens expiring within this window get refreshed (or flagged) early.
const EXPIRY_WINDOW_HOURS: i64 = 24;

/// Hourly token sweep. Google connections with a refresh token get a fresh
/// access token; everything else that is about to expire is flagged
/// `token_expired` so admins can reconnect it.
///
/// Returns how many integrations were handled. A failure on one integration
/// is logged and does not stop the sweep.
pub async fn check_expiring_tokens(deps: &ServerDeps) -> Result<u64> {
    let expiring =
        Integration::find_with_expiring_tokens(EXPIRY_WINDOW_HOURS, &deps.db_pool).await?;

    let mut handled = 0u64;
    for integration in &expiring {
        match handle_expiring(integration, deps).await {
            Ok(()) => handled += 1,
            Err(e) => {
                error!(
                    integration_id = %integration.id,
                    provider = %integration.provider,
                    error = %e,
                    "token expiry handling failed"
                );
            }
        }
    }

    Ok(handled)
}

async fn handle_expiring(integration: &Integration, deps: &ServerDeps) -> Result<()> {
    if integration.provider == IntegrationProvider::GoogleCalendar {
        if let Some(refresh_token) = integration.refresh_token() {
            match deps.calendar.refresh_access_token(refresh_token).await {
                Ok(tokens) => {
                    let expires_at = Utc::now() + Duration::seconds(tokens.expires_in);
                    let credentials = integration.merged_google_credentials(
                        &tokens.access_token,
                        expires_at,
                        tokens.refresh_token.as_deref(),
                    );
                    Integration::update_credentials(integration.id, credentials, &deps.db_pool)
                        .await?;
                    Integration::record_health_ok(integration.id, &deps.db_pool).await?;

                    info!(
                        integration_id = %integration.id,
                        "refreshed Google Calendar access token"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        integration_id = %integration.id,
                        error = %e,
                        "Google token refresh failed"
                    );
                    return mark_expired(integration, &format!("token refresh failed: {}", e), deps)
                        .await;
                }
            }
        }
    }

    // Facebook page tokens and refresh-less Google connections cannot be
    // renewed server-side; the user has to go through OAuth again.
    mark_expired(
        integration,
        "access token expires soon and cannot be refreshed",
        deps,
    )
    .await
}

async fn mark_expired(integration: &Integration, reason: &str, deps: &ServerDeps) -> Result<()> {
    Integration::set_status(integration.id, IntegrationStatus::TokenExpired, &deps.db_pool).await?;
    let updated = Integration::record_health_error(integration.id, reason, &deps.db_pool).await?;

    warn!(
        integration_id = %integration.id,
        provider = %integration.provider,
        reason = %reason,
        "integration token expired"
    );

    effects::dispatch(IntegrationEvent::TokenExpired { integration: updated }, deps).await;

    Ok(())
}
