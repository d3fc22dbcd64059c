use anyhow::{anyhow, Result};

use crate::common::pagination::{Page, PaginationArgs};
use crate::common::UserId;
use crate::domains::users::models::{User, UserFilter};
use crate::kernel::ServerDeps;

pub async fn get_user(user_id: UserId, deps: &ServerDeps) -> Result<User> {
    User::find_by_id(user_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("User not found: {}", user_id))
}

pub async fn list_users(
    filter: UserFilter,
    pagination: PaginationArgs,
    deps: &ServerDeps,
) -> Result<Page<User>> {
    let args = pagination.validate().map_err(|e| anyhow!(e))?;
    let (users, has_more) = User::find_paginated(&filter, &args, &deps.db_pool).await?;
    Ok(Page::build(users, has_more, &args, |u| u.id.into_uuid()))
}
