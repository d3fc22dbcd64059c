use anyhow::{anyhow, bail, Result};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::domains::integrations::commands::ImportFacebookLeadCommand;
use crate::domains::integrations::models::{Integration, IntegrationProvider, IntegrationStatus};
use crate::domains::leads::events::LeadEvent;
use crate::domains::leads::models::{ActivityKind, Lead, LeadActivity, LeadSource};
use crate::domains::workflows::dispatcher::{self, TriggerEvent};
use crate::kernel::facebook_client::FacebookLead;
use crate::kernel::ServerDeps;

/// Form field names that map onto first-class lead columns
const NAME_FIELDS: [&str; 2] = ["full_name", "name"];
const EMAIL_FIELDS: [&str; 1] = ["email"];
const PHONE_FIELDS: [&str; 2] = ["phone_number", "phone"];
const COMPANY_FIELDS: [&str; 2] = ["company_name", "company"];

/// Job handler for `facebook.import_lead`.
///
/// Fetch errors return `Err` and count against the job's retries; once the
/// lead row is committed the import is done and later steps only log.
pub async fn import_facebook_lead(
    command: ImportFacebookLeadCommand,
    deps: &ServerDeps,
) -> Result<()> {
    let integration = Integration::find_by_provider(IntegrationProvider::Facebook, &deps.db_pool)
        .await?
        .ok_or_else(|| anyhow!("Facebook integration is not configured"))?;

    if integration.status != IntegrationStatus::Connected {
        bail!(
            "Facebook integration is {}, cannot import lead {}",
            integration.status,
            command.leadgen_id
        );
    }

    let external_ref = format!("facebook:{}", command.leadgen_id);

    // Queue idempotency only covers in-flight jobs; a redelivery after the
    // first import finished lands here instead
    if let Some(existing) = Lead::find_by_external_ref(&external_ref, &deps.db_pool).await? {
        info!(
            lead_id = %existing.id,
            leadgen_id = %command.leadgen_id,
            "lead already imported, skipping"
        );
        return Ok(());
    }

    let page_token = integration
        .credentials
        .get("page_token")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Facebook credentials are missing the page token"))?;

    let fetched = match deps.facebook.fetch_lead(&command.leadgen_id, page_token).await {
        Ok(lead) => lead,
        Err(e) => {
            Integration::record_import_failure(integration.id, &e.to_string(), &deps.db_pool)
                .await?;
            return Err(e);
        }
    };

    let mut lead = lead_from_form(&command, &fetched);
    lead.external_ref = Some(external_ref);

    let mut tx = deps.db_pool.begin().await?;
    let lead = lead.insert(&mut tx).await?;
    let activity = LeadActivity::new(
        lead.id,
        None,
        ActivityKind::Imported,
        json!({
            "source": "facebook",
            "leadgen_id": command.leadgen_id,
            "form_id": command.form_id,
            "page_id": command.page_id,
        }),
    )
    .insert(&mut tx)
    .await?;
    tx.commit().await?;

    Integration::record_import_success(integration.id, &deps.db_pool).await?;

    info!(
        lead_id = %lead.id,
        leadgen_id = %command.leadgen_id,
        "imported Facebook lead"
    );

    // Both trigger surfaces fire: generic lead_created and the
    // import-specific one. Same event id, different trigger types.
    let created = LeadEvent::Created {
        lead: lead.clone(),
        activity_id: activity.id,
    };
    if let Err(e) = dispatcher::dispatch_lead_event(&created, deps).await {
        error!(error = %e, lead_id = %lead.id, "failed to dispatch lead created event");
    }

    let imported = TriggerEvent::new(
        "trigger.facebook_lead_imported",
        activity.id.into_uuid(),
        json!({ "lead": lead, "leadgen_id": command.leadgen_id }),
    );
    if let Err(e) = dispatcher::dispatch_trigger(&imported, deps).await {
        error!(error = %e, lead_id = %lead.id, "failed to dispatch import trigger");
    }

    Ok(())
}

/// Map form fields onto a lead: well-known names become columns, the rest
/// land in the custom `fields` object.
fn lead_from_form(command: &ImportFacebookLeadCommand, fetched: &FacebookLead) -> Lead {
    let name = first_match(fetched, &NAME_FIELDS)
        .map(String::from)
        .unwrap_or_else(|| format!("Facebook lead {}", command.leadgen_id));

    let mut lead = Lead::new(name, LeadSource::FacebookAds);
    lead.email = first_match(fetched, &EMAIL_FIELDS).map(String::from);
    lead.phone = first_match(fetched, &PHONE_FIELDS).map(String::from);
    lead.company = first_match(fetched, &COMPANY_FIELDS).map(String::from);

    let well_known: Vec<&str> = NAME_FIELDS
        .iter()
        .chain(&EMAIL_FIELDS)
        .chain(&PHONE_FIELDS)
        .chain(&COMPANY_FIELDS)
        .copied()
        .collect();

    let mut extras = Map::new();
    for field in &fetched.field_data {
        if well_known.contains(&field.name.as_str()) {
            continue;
        }
        if let Some(value) = field.values.first() {
            extras.insert(field.name.clone(), Value::String(value.clone()));
        }
    }
    lead.fields = Value::Object(extras);

    lead
}

fn first_match<'a>(fetched: &'a FacebookLead, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| fetched.field(name))
}
