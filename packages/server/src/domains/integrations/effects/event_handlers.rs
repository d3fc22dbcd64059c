//! Effects run in response to integration events.

use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::domains::integrations::events::IntegrationEvent;
use crate::domains::notifications::notify_admins;
use crate::kernel::ServerDeps;

/// Tag under which integration status snapshots are cached
pub const INTEGRATIONS_CACHE_TAG: &str = "integrations";

/// React to a connection change: drop the cached status snapshot and tell
/// the admins what happened.
pub async fn handle_integration_event(event: &IntegrationEvent, deps: &ServerDeps) -> Result<()> {
    deps.cache.invalidate_tag(INTEGRATIONS_CACHE_TAG).await;

    let integration = event.integration();
    let notified = notify_admins(
        "Integration update",
        &event.describe(),
        json!({
            "integration_id": integration.id,
            "provider": integration.provider,
            "status": integration.status,
        }),
        deps,
    )
    .await?;

    info!(
        provider = %event.provider(),
        status = %integration.status,
        notified,
        "integration event handled"
    );
    Ok(())
}
