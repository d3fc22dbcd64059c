use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::domains::integrations::actions::oauth_state;
use crate::domains::integrations::events::IntegrationEvent;
use crate::domains::integrations::models::{Integration, IntegrationProvider, IntegrationStatus};
use crate::kernel::google_client::oauth_consent_url;
use crate::kernel::ServerDeps;

/// Cache namespace for Google OAuth states
const STATE_PROVIDER: &str = "google_calendar";

fn redirect_uri(deps: &ServerDeps) -> String {
    format!("{}/calendar/oauth/callback", deps.public_base_url)
}

/// Consent screen URL with a fresh state nonce. Offline access is requested
/// so the exchange returns a refresh token.
pub async fn google_connect_url(deps: &ServerDeps) -> String {
    let state = oauth_state::issue_state(STATE_PROVIDER, deps).await;
    oauth_consent_url(&deps.google_client_id, &redirect_uri(deps), &state)
}

/// Finish the OAuth dance: validate state, exchange the code, store the
/// token set on the GoogleCalendar integration row.
pub async fn google_oauth_callback(
    code: &str,
    state: &str,
    deps: &ServerDeps,
) -> Result<Integration> {
    if !oauth_state::consume_state(state, STATE_PROVIDER, deps).await {
        bail!("Invalid or expired OAuth state");
    }

    let tokens = deps.calendar.exchange_code(code, &redirect_uri(deps)).await?;
    let expires_at = Utc::now() + Duration::seconds(tokens.expires_in);

    if tokens.refresh_token.is_none() {
        // Google omits the refresh token when the user already consented;
        // without one the hourly check cannot renew this connection.
        warn!("Google token exchange returned no refresh token");
    }

    let credentials = json!({
        "access_token": tokens.access_token,
        "expires_at": expires_at.to_rfc3339(),
        "refresh_token": tokens.refresh_token,
    });

    let integration = Integration::upsert_connected(
        IntegrationProvider::GoogleCalendar,
        "Google Calendar",
        credentials,
        &deps.db_pool,
    )
    .await?;

    info!("Google Calendar integration connected");

    crate::domains::integrations::effects::dispatch(
        IntegrationEvent::Connected {
            integration: integration.clone(),
        },
        deps,
    )
    .await;

    Ok(integration)
}

/// Disconnect Google Calendar. The row stays so sync stats survive a
/// reconnect, but the status blocks every calendar call.
pub async fn disconnect_google(deps: &ServerDeps) -> Result<Integration> {
    let integration =
        Integration::find_by_provider(IntegrationProvider::GoogleCalendar, &deps.db_pool)
            .await?
            .ok_or_else(|| anyhow!("Google Calendar is not connected"))?;

    let integration =
        Integration::set_status(integration.id, IntegrationStatus::Disconnected, &deps.db_pool)
            .await?;

    info!("Google Calendar integration disconnected");

    crate::domains::integrations::effects::dispatch(
        IntegrationEvent::Disconnected {
            integration: integration.clone(),
        },
        deps,
    )
    .await;

    Ok(integration)
}
