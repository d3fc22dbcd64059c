use anyhow::{anyhow, bail, Result};
use tracing::{error, info, warn};

use crate::common::{LeadId, UserId};
use crate::domains::leads::data::{CreateLeadInput, UpdateLeadInput};
use crate::domains::leads::events::LeadEvent;
use crate::domains::leads::models::{ActivityKind, Lead, LeadActivity, LeadSource, LeadStatus};
use crate::domains::users::models::User;
use crate::domains::workflows;
use crate::kernel::traits::Notifier;
use crate::kernel::ServerDeps;

/// Hand a committed event to the workflow dispatcher. Dispatch failures are
/// logged, not bubbled; the mutation itself already committed.
async fn dispatch(event: LeadEvent, deps: &ServerDeps) {
    if let Err(e) = workflows::dispatcher::dispatch_lead_event(&event, deps).await {
        error!(
            error = %e,
            trigger = event.trigger_type(),
            lead_id = %event.lead().id,
            "failed to dispatch lead event"
        );
    }
}

pub async fn create_lead(
    input: CreateLeadInput,
    actor_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<Lead> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        bail!("Lead name is invalid: must not be empty");
    }

    if let Some(owner_id) = input.owner_id {
        if User::find_by_id(owner_id, &deps.db_pool).await?.is_none() {
            bail!("Owner not found: {}", owner_id);
        }
    }

    let mut lead = Lead::new(name, input.source.unwrap_or(LeadSource::Manual));
    lead.email = input.email;
    lead.phone = input.phone;
    lead.company = input.company;
    lead.owner_id = input.owner_id;
    if let Some(fields) = input.fields {
        lead.fields = fields;
    }

    let mut tx = deps.db_pool.begin().await?;
    let lead = lead.insert(&mut tx).await?;
    let activity = LeadActivity::new(
        lead.id,
        actor_id,
        ActivityKind::Created,
        serde_json::json!({ "source": lead.source }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    info!(lead_id = %lead.id, source = %lead.source, "created lead");

    dispatch(
        LeadEvent::Created {
            lead: lead.clone(),
            activity_id: activity.id,
        },
        deps,
    )
    .await;

    Ok(lead)
}

pub async fn update_lead(
    lead_id: LeadId,
    input: UpdateLeadInput,
    actor_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<Lead> {
    let current = Lead::find_by_id(lead_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Lead not found: {}", lead_id))?;

    let mut changed = Vec::new();
    let name = match &input.name {
        Some(name) if name.trim() != current.name => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Lead name is invalid: must not be empty");
            }
            changed.push("name".to_string());
            name
        }
        _ => current.name.clone(),
    };
    let email = pick_change("email", input.email, &current.email, &mut changed);
    let phone = pick_change("phone", input.phone, &current.phone, &mut changed);
    let company = pick_change("company", input.company, &current.company, &mut changed);
    let fields = match input.fields {
        Some(fields) if fields != current.fields => {
            changed.push("fields".to_string());
            fields
        }
        _ => current.fields.clone(),
    };

    if changed.is_empty() {
        return Ok(current);
    }

    let mut tx = deps.db_pool.begin().await?;
    let lead = Lead::update_fields(
        lead_id,
        &name,
        email.as_deref(),
        phone.as_deref(),
        company.as_deref(),
        &fields,
        &mut tx,
    )
    .await?;
    let activity = LeadActivity::new(
        lead.id,
        actor_id,
        ActivityKind::Updated,
        serde_json::json!({ "changed": changed }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    info!(lead_id = %lead.id, changed = ?changed, "updated lead");

    dispatch(
        LeadEvent::Updated {
            lead: lead.clone(),
            changed,
            activity_id: activity.id,
        },
        deps,
    )
    .await;

    Ok(lead)
}

/// Keep the current value unless the input supplies a different one.
fn pick_change(
    field: &str,
    input: Option<String>,
    current: &Option<String>,
    changed: &mut Vec<String>,
) -> Option<String> {
    match input {
        Some(value) if Some(&value) != current.as_ref() => {
            changed.push(field.to_string());
            Some(value)
        }
        Some(value) => Some(value),
        None => current.clone(),
    }
}

pub async fn change_lead_status(
    lead_id: LeadId,
    status: LeadStatus,
    actor_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<Lead> {
    let current = Lead::find_by_id(lead_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Lead not found: {}", lead_id))?;

    if current.status == status {
        bail!("Lead is already {}", status);
    }

    let from = current.status;

    let mut tx = deps.db_pool.begin().await?;
    let lead = Lead::set_status(lead_id, status, &mut tx).await?;
    let activity = LeadActivity::new(
        lead.id,
        actor_id,
        ActivityKind::StatusChanged,
        serde_json::json!({ "from": from, "to": status }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    info!(lead_id = %lead.id, from = %from, to = %status, "changed lead status");

    dispatch(
        LeadEvent::StatusChanged {
            lead: lead.clone(),
            from,
            to: status,
            activity_id: activity.id,
        },
        deps,
    )
    .await;

    Ok(lead)
}

pub async fn assign_lead(
    lead_id: LeadId,
    owner_id: Option<UserId>,
    actor_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<Lead> {
    let current = Lead::find_by_id(lead_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Lead not found: {}", lead_id))?;

    if let Some(owner_id) = owner_id {
        if User::find_by_id(owner_id, &deps.db_pool).await?.is_none() {
            bail!("Owner not found: {}", owner_id);
        }
    }

    let previous_owner = current.owner_id;

    let mut tx = deps.db_pool.begin().await?;
    let lead = Lead::set_owner(lead_id, owner_id, &mut tx).await?;
    let activity = LeadActivity::new(
        lead.id,
        actor_id,
        ActivityKind::Assigned,
        serde_json::json!({ "from": previous_owner, "to": owner_id }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    info!(lead_id = %lead.id, owner = ?owner_id, "assigned lead");

    if let Some(new_owner) = owner_id {
        if previous_owner != Some(new_owner) {
            let body = format!("Lead \"{}\" was assigned to you", lead.name);
            if let Err(e) = deps
                .notify(
                    new_owner,
                    "Lead assigned",
                    &body,
                    serde_json::json!({ "lead_id": lead.id }),
                )
                .await
            {
                warn!(user_id = %new_owner, error = %e, "owner notification failed");
            }
        }
    }

    dispatch(
        LeadEvent::Assigned {
            lead: lead.clone(),
            previous_owner,
            activity_id: activity.id,
        },
        deps,
    )
    .await;

    Ok(lead)
}

pub async fn add_note(
    lead_id: LeadId,
    note: String,
    actor_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<LeadActivity> {
    let note = note.trim().to_string();
    if note.is_empty() {
        bail!("Note is invalid: must not be empty");
    }

    if Lead::find_by_id(lead_id, &deps.db_pool).await?.is_none() {
        bail!("Lead not found: {}", lead_id);
    }

    let mut tx = deps.db_pool.begin().await?;
    let activity = LeadActivity::new(
        lead_id,
        actor_id,
        ActivityKind::NoteAdded,
        serde_json::json!({ "note": note }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    Ok(activity)
}

pub async fn delete_lead(lead_id: LeadId, deps: &ServerDeps) -> Result<()> {
    if !Lead::delete(lead_id, &deps.db_pool).await? {
        bail!("Lead not found: {}", lead_id);
    }

    info!(lead_id = %lead_id, "deleted lead");
    Ok(())
}
