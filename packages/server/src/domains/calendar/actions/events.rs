use anyhow::{anyhow, bail, Result};
use chrono::Duration;
use serde_json::json;
use tracing::info;

use crate::common::UserId;
use crate::domains::calendar::actions::tokens::ensure_access_token;
use crate::domains::calendar::data::CreateEventInput;
use crate::domains::leads::models::{ActivityKind, Lead, LeadActivity};
use crate::kernel::google_client::{CalendarEvent, CalendarEventInput};
use crate::kernel::ServerDeps;

const MAX_UPCOMING_RESULTS: u32 = 50;

/// Schedule a follow-up event for a lead on the connected calendar and
/// record it on the lead's timeline.
pub async fn create_event_for_lead(
    input: CreateEventInput,
    actor_id: Option<UserId>,
    deps: &ServerDeps,
) -> Result<CalendarEvent> {
    let summary = input.summary.trim().to_string();
    if summary.is_empty() {
        bail!("Event summary is invalid: must not be empty");
    }
    if input.duration_minutes <= 0 {
        bail!("Event duration must be positive");
    }

    let lead = Lead::find_by_id(input.lead_id, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Lead not found: {}", input.lead_id))?;

    let access_token = ensure_access_token(deps).await?;

    let end = input.start + Duration::minutes(input.duration_minutes);
    let event = deps
        .calendar
        .create_event(
            &access_token,
            CalendarEventInput {
                summary: summary.clone(),
                description: Some(format!("Lead: {} ({})", lead.name, lead.id)),
                start: input.start,
                end,
            },
        )
        .await?;

    let mut tx = deps.db_pool.begin().await?;
    LeadActivity::new(
        lead.id,
        actor_id,
        ActivityKind::CalendarEventScheduled,
        json!({ "event_id": event.id, "summary": summary, "start": input.start }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    info!(lead_id = %lead.id, event_id = %event.id, "scheduled calendar event");

    Ok(event)
}

/// Upcoming events from the connected calendar, soonest first.
pub async fn list_upcoming_events(max: u32, deps: &ServerDeps) -> Result<Vec<CalendarEvent>> {
    let max = max.clamp(1, MAX_UPCOMING_RESULTS);
    let access_token = ensure_access_token(deps).await?;
    deps.calendar.list_upcoming(&access_token, max).await
}
