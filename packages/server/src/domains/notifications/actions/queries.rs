use anyhow::{anyhow, bail, Result};

use crate::common::pagination::{Page, PaginationArgs};
use crate::common::{NotificationId, UserId};
use crate::domains::notifications::models::Notification;
use crate::kernel::ServerDeps;

pub async fn list_notifications(
    user_id: UserId,
    pagination: PaginationArgs,
    deps: &ServerDeps,
) -> Result<Page<Notification>> {
    let args = pagination.validate().map_err(|e| anyhow!(e))?;
    let (rows, has_more) = Notification::find_paginated(user_id, &args, &deps.db_pool).await?;
    Ok(Page::build(rows, has_more, &args, |n| n.id.into_uuid()))
}

pub async fn mark_notification_read(
    id: NotificationId,
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<()> {
    if !Notification::mark_read(id, user_id, &deps.db_pool).await? {
        bail!("Notification not found: {}", id);
    }
    Ok(())
}
