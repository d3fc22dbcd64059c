use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;

use crate::domains::integrations::events::IntegrationEvent;
use crate::domains::integrations::models::{Integration, IntegrationProvider, IntegrationStatus};
use crate::kernel::facebook_client::oauth_dialog_url;
use crate::kernel::ServerDeps;

use super::oauth_state;

fn redirect_uri(deps: &ServerDeps) -> String {
    format!(
        "{}/integrations/facebook/oauth/callback",
        deps.public_base_url
    )
}

/// Build the Facebook OAuth dialog URL with a fresh state token
pub async fn facebook_connect_url(deps: &ServerDeps) -> String {
    let state = oauth_state::issue_state("facebook", deps).await;
    oauth_dialog_url(&deps.facebook_app_id, &redirect_uri(deps), &state)
}

/// Complete the OAuth dance: exchange the code, adopt the first managed
/// page (its token is what reads leads), subscribe it to the leadgen
/// webhook and store everything as a Connected integration.
pub async fn facebook_oauth_callback(
    code: &str,
    state: &str,
    deps: &ServerDeps,
) -> Result<Integration> {
    if !oauth_state::consume_state(state, "facebook", deps).await {
        bail!("Invalid or expired OAuth state");
    }

    let tokens = deps.facebook.exchange_code(code, &redirect_uri(deps)).await?;
    let pages = deps.facebook.fetch_pages(&tokens.access_token).await?;
    let page = pages
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("The connected Facebook account manages no pages"))?;

    deps.facebook
        .subscribe_page(&page.id, &page.access_token)
        .await?;

    let expires_at = tokens
        .expires_in
        .map(|secs| (Utc::now() + Duration::seconds(secs)).to_rfc3339());
    let credentials = json!({
        "access_token": tokens.access_token,
        "expires_at": expires_at,
        "page_id": page.id,
        "page_name": page.name,
        "page_token": page.access_token,
    });

    let integration = Integration::upsert_connected(
        IntegrationProvider::Facebook,
        "Facebook Lead Ads",
        credentials,
        &deps.db_pool,
    )
    .await?;

    info!(page = %page.name, "Facebook integration connected");

    crate::domains::integrations::effects::dispatch(
        IntegrationEvent::Connected {
            integration: integration.clone(),
        },
        deps,
    )
    .await;

    Ok(integration)
}

/// Disconnect Facebook. Credentials stay on the row but the status stops
/// every import path.
pub async fn disconnect_facebook(deps: &ServerDeps) -> Result<Integration> {
    let integration = Integration::find_by_provider(IntegrationProvider::Facebook, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Facebook is not connected"))?;

    let integration =
        Integration::set_status(integration.id, IntegrationStatus::Disconnected, &deps.db_pool)
            .await?;

    info!("Facebook integration disconnected");

    crate::domains::integrations::effects::dispatch(
        IntegrationEvent::Disconnected {
            integration: integration.clone(),
        },
        deps,
    )
    .await;

    Ok(integration)
}
