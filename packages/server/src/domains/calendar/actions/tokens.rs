use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Utc};
use tracing::info;

use crate::domains::integrations::models::{Integration, IntegrationProvider, IntegrationStatus};
use crate::kernel::ServerDeps;

/// Tokens this close to expiry get refreshed before use.
const REFRESH_LEEWAY_SECONDS: i64 = 60;

/// A Google access token that is valid right now.
///
/// Refreshes in place when the stored token is expired or about to expire,
/// so callers never hand a dead token to the Calendar API. The hourly sweep
/// does the same proactively; this covers the gap between sweeps.
pub async fn ensure_access_token(deps: &ServerDeps) -> Result<String> {
    let integration =
        Integration::find_by_provider(IntegrationProvider::GoogleCalendar, &deps.db_pool)
            .await?
            .ok_or_else(|| anyhow!("Google Calendar is not connected"))?;

    if integration.status != IntegrationStatus::Connected {
        bail!(
            "Google Calendar connection is {}; reconnect it",
            integration.status
        );
    }

    let usable_until = Utc::now() + Duration::seconds(REFRESH_LEEWAY_SECONDS);
    let still_valid = integration
        .token_expires_at()
        .map(|expires_at| expires_at > usable_until)
        .unwrap_or(false);

    if still_valid {
        return integration
            .access_token()
            .map(String::from)
            .ok_or_else(|| anyhow!("Google credentials are missing the access token"));
    }

    let refresh_token = integration
        .refresh_token()
        .ok_or_else(|| anyhow!("Google credentials have no refresh token; reconnect the integration"))?;

    let tokens = match deps.calendar.refresh_access_token(refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            Integration::record_health_error(
                integration.id,
                &format!("token refresh failed: {}", e),
                &deps.db_pool,
            )
            .await?;
            return Err(e);
        }
    };

    let expires_at = Utc::now() + Duration::seconds(tokens.expires_in);
    let credentials = integration.merged_google_credentials(
        &tokens.access_token,
        expires_at,
        tokens.refresh_token.as_deref(),
    );
    Integration::update_credentials(integration.id, credentials, &deps.db_pool).await?;
    Integration::record_health_ok(integration.id, &deps.db_pool).await?;

    info!("refreshed Google Calendar access token on demand");

    Ok(tokens.access_token)
}
