//! Notification delivery
//!
//! `ServerDeps` implements the kernel `Notifier` trait here so any code
//! holding deps can raise a notification without importing this domain's
//! internals. The in-app row is authoritative; SMS rides along best-effort.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::common::UserId;
use crate::domains::notifications::models::Notification;
use crate::domains::users::models::User;
use crate::kernel::traits::Notifier;
use crate::kernel::ServerDeps;

#[async_trait]
impl Notifier for ServerDeps {
    async fn notify(
        &self,
        user_id: UserId,
        title: &str,
        body: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let user = User::find_by_id(user_id, &self.db_pool)
            .await?
            .ok_or_else(|| anyhow!("User not found: {}", user_id))?;

        Notification::new(user.id, title.to_string(), body.to_string(), payload)
            .insert(&self.db_pool)
            .await?;

        // Normalized phone identifiers always carry the E.164 prefix.
        if user.identifier.starts_with('+') {
            if let Err(e) = self.sms.send_sms(&user.identifier, body).await {
                warn!(user_id = %user.id, error = %e, "notification SMS delivery failed");
            }
        }

        Ok(())
    }
}

/// Notify every active admin. Returns how many inboxes were written;
/// individual failures are logged and skipped.
pub async fn notify_admins(
    title: &str,
    body: &str,
    payload: serde_json::Value,
    deps: &ServerDeps,
) -> Result<usize> {
    let admins = User::find_active_admins(&deps.db_pool).await?;

    let results = join_all(
        admins
            .iter()
            .map(|admin| deps.notify(admin.id, title, body, payload.clone())),
    )
    .await;

    let mut delivered = 0;
    for result in results {
        match result {
            Ok(()) => delivered += 1,
            Err(e) => warn!(error = %e, "admin notification failed"),
        }
    }

    Ok(delivered)
}
