use anyhow::{anyhow, Result};

use crate::common::pagination::{Page, PaginationArgs};
use crate::common::LeadId;
use crate::domains::leads::models::{Lead, LeadActivity, LeadFilter};
use crate::kernel::ServerDeps;

pub async fn get_lead(lead_id: LeadId, deps: &ServerDeps) -> Result<Lead> {
    Lead::find_by_id(lead_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Lead not found: {}", lead_id))
}

pub async fn list_leads(
    filter: LeadFilter,
    pagination: PaginationArgs,
    deps: &ServerDeps,
) -> Result<Page<Lead>> {
    let args = pagination.validate().map_err(|e| anyhow!(e))?;
    let (leads, has_more) = Lead::find_paginated(&filter, &args, &deps.db_pool).await?;
    Ok(Page::build(leads, has_more, &args, |l| l.id.into_uuid()))
}

pub async fn list_activities(
    lead_id: LeadId,
    pagination: PaginationArgs,
    deps: &ServerDeps,
) -> Result<Page<LeadActivity>> {
    if Lead::find_by_id(lead_id, &deps.db_pool).await?.is_none() {
        return Err(anyhow!("Lead not found: {}", lead_id));
    }

    let args = pagination.validate().map_err(|e| anyhow!(e))?;
    let (rows, has_more) = LeadActivity::find_paginated(lead_id, &args, &deps.db_pool).await?;
    Ok(Page::build(rows, has_more, &args, |a| a.id.into_uuid()))
}
