use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::warn;

use crate::common::{LeadId, UserId};
use crate::domains::leads::models::{ActivityKind, Lead, LeadActivity, LeadStatus};
use crate::domains::users::models::User;
use crate::kernel::google_client::CalendarEventInput;
use crate::kernel::{Notifier, ServerDeps};

/// A built-in workflow action.
///
/// `validate_config` runs at save time so a broken graph is rejected before
/// it can activate; `execute` runs inside a workflow run with the
/// field-mapped `input` and the step's static `config`. The returned value
/// becomes the step's output in the run context.
///
/// Lead mutations performed here write a `WorkflowAction` activity in the
/// same transaction and do NOT re-enter the trigger bus: workflow-induced
/// changes never fire triggers, so graphs cannot feed back into themselves.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn action_type(&self) -> &'static str;

    fn validate_config(&self, config: &Value) -> Result<()>;

    async fn execute(&self, input: &Value, config: &Value, deps: &ServerDeps) -> Result<Value>;
}

/// Lookup table of the built-in action handlers
pub struct ActionRegistry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn builtin() -> Self {
        let handlers: Vec<Arc<dyn ActionHandler>> = vec![
            Arc::new(UpdateLeadStatusAction),
            Arc::new(AssignLeadAction),
            Arc::new(AddLeadNoteAction),
            Arc::new(SendNotificationAction),
            Arc::new(SendWebhookAction),
            Arc::new(CreateCalendarEventAction),
        ];

        ActionRegistry {
            handlers: handlers.into_iter().map(|h| (h.action_type(), h)).collect(),
        }
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

/// Pull the lead id an action operates on out of its mapped input
fn require_lead_id(input: &Value) -> Result<LeadId> {
    let raw = input
        .get("lead_id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("action input requires 'lead_id'"))?;

    LeadId::parse(raw).map_err(|_| anyhow!("'lead_id' is not a valid id: {}", raw))
}

fn require_config_str<'a>(config: &'a Value, key: &str) -> Result<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("config requires a non-empty '{}'", key))
}

/// Replace `{{path}}` placeholders with values from the mapped input.
/// Paths are slash lookups; a missing field renders as an empty string.
fn render_template(template: &str, input: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                if let Some(v) = input.pointer(&format!("/{}", path)).filter(|v| !v.is_null()) {
                    match v {
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

// =============================================================================
// action.update_lead_status
// =============================================================================

struct UpdateLeadStatusAction;

#[async_trait]
impl ActionHandler for UpdateLeadStatusAction {
    fn action_type(&self) -> &'static str {
        "action.update_lead_status"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let raw = config
            .get("status")
            .ok_or_else(|| anyhow!("config requires 'status'"))?;
        serde_json::from_value::<LeadStatus>(raw.clone())
            .map_err(|_| anyhow!("unknown lead status: {}", raw))?;
        Ok(())
    }

    async fn execute(&self, input: &Value, config: &Value, deps: &ServerDeps) -> Result<Value> {
        let lead_id = require_lead_id(input)?;
        let status: LeadStatus = serde_json::from_value(
            config
                .get("status")
                .cloned()
                .ok_or_else(|| anyhow!("config requires 'status'"))?,
        )?;

        let lead = Lead::find_by_id(lead_id, &deps.db_pool)
            .await?
            .ok_or_else(|| anyhow!("Lead not found: {}", lead_id))?;

        // Already there: succeed without writing anything
        if lead.status == status {
            return Ok(json!({ "lead_id": lead_id, "status": status, "changed": false }));
        }

        let from = lead.status;
        let mut tx = deps.db_pool.begin().await?;
        Lead::set_status(lead_id, status, &mut tx).await?;
        LeadActivity::new(
            lead_id,
            None,
            ActivityKind::WorkflowAction,
            json!({ "action": self.action_type(), "from": from, "to": status }),
        )
        .insert(&mut tx)
        .await?;
        tx.commit().await?;

        Ok(json!({ "lead_id": lead_id, "from": from, "to": status, "changed": true }))
    }
}

// =============================================================================
// action.assign_lead
// =============================================================================

struct AssignLeadAction;

#[async_trait]
impl ActionHandler for AssignLeadAction {
    fn action_type(&self) -> &'static str {
        "action.assign_lead"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let raw = require_config_str(config, "user_id")?;
        UserId::parse(raw).map_err(|_| anyhow!("'user_id' is not a valid id: {}", raw))?;
        Ok(())
    }

    async fn execute(&self, input: &Value, config: &Value, deps: &ServerDeps) -> Result<Value> {
        let lead_id = require_lead_id(input)?;
        let user_id = UserId::parse(require_config_str(config, "user_id")?)
            .map_err(|e| anyhow!("'user_id' is not a valid id: {}", e))?;

        let assignee = User::find_by_id(user_id, &deps.db_pool)
            .await?
            .ok_or_else(|| anyhow!("Assignee not found: {}", user_id))?;
        if !assignee.active {
            bail!("Assignee is deactivated: {}", user_id);
        }

        let lead = Lead::find_by_id(lead_id, &deps.db_pool)
            .await?
            .ok_or_else(|| anyhow!("Lead not found: {}", lead_id))?;

        if lead.owner_id == Some(user_id) {
            return Ok(json!({ "lead_id": lead_id, "owner_id": user_id, "changed": false }));
        }

        let previous = lead.owner_id;
        let mut tx = deps.db_pool.begin().await?;
        let lead = Lead::set_owner(lead_id, Some(user_id), &mut tx).await?;
        LeadActivity::new(
            lead_id,
            None,
            ActivityKind::WorkflowAction,
            json!({ "action": self.action_type(), "from": previous, "to": user_id }),
        )
        .insert(&mut tx)
        .await?;
        tx.commit().await?;

        let body = format!("You were assigned the lead {}.", lead.name);
        if let Err(e) = deps
            .notify(user_id, "Lead assigned", &body, json!({ "lead_id": lead_id }))
            .await
        {
            warn!(user_id = %user_id, error = %e, "assignment notification failed");
        }

        Ok(json!({ "lead_id": lead_id, "owner_id": user_id, "changed": true }))
    }
}

// =============================================================================
// action.add_lead_note
// =============================================================================

struct AddLeadNoteAction;

#[async_trait]
impl ActionHandler for AddLeadNoteAction {
    fn action_type(&self) -> &'static str {
        "action.add_lead_note"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        require_config_str(config, "note")?;
        Ok(())
    }

    async fn execute(&self, input: &Value, config: &Value, deps: &ServerDeps) -> Result<Value> {
        let lead_id = require_lead_id(input)?;
        let template = require_config_str(config, "note")?;
        let note = render_template(template, input);

        if Lead::find_by_id(lead_id, &deps.db_pool).await?.is_none() {
            bail!("Lead not found: {}", lead_id);
        }

        let mut tx = deps.db_pool.begin().await?;
        LeadActivity::new(
            lead_id,
            None,
            ActivityKind::WorkflowAction,
            json!({ "action": self.action_type(), "note": note }),
        )
        .insert(&mut tx)
        .await?;
        tx.commit().await?;

        Ok(json!({ "lead_id": lead_id, "note": note }))
    }
}

// =============================================================================
// action.send_notification
// =============================================================================

struct SendNotificationAction;

#[async_trait]
impl ActionHandler for SendNotificationAction {
    fn action_type(&self) -> &'static str {
        "action.send_notification"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        require_config_str(config, "title")?;
        require_config_str(config, "body")?;
        if let Some(raw) = config.get("user_id").and_then(Value::as_str) {
            UserId::parse(raw).map_err(|_| anyhow!("'user_id' is not a valid id: {}", raw))?;
        }
        Ok(())
    }

    async fn execute(&self, input: &Value, config: &Value, deps: &ServerDeps) -> Result<Value> {
        // Recipient comes from config, or from the mapped input when the
        // graph wires it in (e.g. the lead's owner).
        let raw_recipient = config
            .get("user_id")
            .and_then(Value::as_str)
            .or_else(|| input.get("user_id").and_then(Value::as_str))
            .ok_or_else(|| anyhow!("no recipient: set 'user_id' in config or map it as input"))?;
        let user_id = UserId::parse(raw_recipient)
            .map_err(|_| anyhow!("'user_id' is not a valid id: {}", raw_recipient))?;

        let title = render_template(require_config_str(config, "title")?, input);
        let body = render_template(require_config_str(config, "body")?, input);

        deps.notify(user_id, &title, &body, input.clone()).await?;

        Ok(json!({ "user_id": user_id, "title": title }))
    }
}

// =============================================================================
// action.send_webhook
// =============================================================================

struct SendWebhookAction;

#[async_trait]
impl ActionHandler for SendWebhookAction {
    fn action_type(&self) -> &'static str {
        "action.send_webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let raw = require_config_str(config, "url")?;
        let url = reqwest::Url::parse(raw).map_err(|e| anyhow!("invalid 'url': {}", e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("'url' must be http or https");
        }
        Ok(())
    }

    async fn execute(&self, input: &Value, config: &Value, _deps: &ServerDeps) -> Result<Value> {
        let url = require_config_str(config, "url")?;

        let body = serde_json::to_vec(input)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.clone());

        // Sign the exact body bytes so receivers can verify
        if let Some(secret) = config.get("secret").and_then(Value::as_str) {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
                .map_err(|e| anyhow!("invalid webhook secret: {}", e))?;
            mac.update(&body);
            let signature = hex::encode(mac.finalize().into_bytes());
            request = request.header("X-Signature-256", format!("sha256={}", signature));
        }

        let response = request.send().await.context("webhook request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("webhook returned {}", status);
        }

        Ok(json!({ "url": url, "status_code": status.as_u16() }))
    }
}

// =============================================================================
// action.create_calendar_event
// =============================================================================

struct CreateCalendarEventAction;

#[async_trait]
impl ActionHandler for CreateCalendarEventAction {
    fn action_type(&self) -> &'static str {
        "action.create_calendar_event"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        require_config_str(config, "summary")?;
        let minutes = config
            .get("minutes_from_now")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("config requires integer 'minutes_from_now'"))?;
        if minutes < 0 {
            bail!("'minutes_from_now' must not be negative");
        }
        let duration = config
            .get("duration_minutes")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("config requires integer 'duration_minutes'"))?;
        if duration <= 0 {
            bail!("'duration_minutes' must be positive");
        }
        Ok(())
    }

    async fn execute(&self, input: &Value, config: &Value, deps: &ServerDeps) -> Result<Value> {
        let summary = render_template(require_config_str(config, "summary")?, input);
        let minutes_from_now = config
            .get("minutes_from_now")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("config requires integer 'minutes_from_now'"))?;
        let duration_minutes = config
            .get("duration_minutes")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("config requires integer 'duration_minutes'"))?;

        let access_token = crate::domains::calendar::actions::ensure_access_token(deps).await?;

        let start = Utc::now() + Duration::minutes(minutes_from_now);
        let end = start + Duration::minutes(duration_minutes);
        let description = input
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);

        let event = deps
            .calendar
            .create_event(
                &access_token,
                CalendarEventInput {
                    summary: summary.clone(),
                    description,
                    start,
                    end,
                },
            )
            .await?;

        // A lead-linked event leaves a trace on the lead's timeline
        if let Some(raw) = input.get("lead_id").and_then(Value::as_str) {
            if let Ok(lead_id) = LeadId::parse(raw) {
                let mut tx = deps.db_pool.begin().await?;
                LeadActivity::new(
                    lead_id,
                    None,
                    ActivityKind::CalendarEventScheduled,
                    json!({ "event_id": event.id, "summary": summary, "start": start }),
                )
                .insert(&mut tx)
                .await?;
                tx.commit().await?;
            }
        }

        Ok(json!({
            "event_id": event.id,
            "summary": summary,
            "start": start,
            "end": end,
            "html_link": event.html_link,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_knows_every_action() {
        let registry = ActionRegistry::builtin();
        assert_eq!(
            registry.registered_types(),
            vec![
                "action.add_lead_note",
                "action.assign_lead",
                "action.create_calendar_event",
                "action.send_notification",
                "action.send_webhook",
                "action.update_lead_status",
            ]
        );
        assert!(registry.get("action.send_webhook").is_some());
        assert!(registry.get("action.launch_missiles").is_none());
    }

    #[test]
    fn test_render_template_resolves_paths() {
        let input = json!({
            "name": "Dana Woods",
            "lead": { "score": 72 }
        });
        assert_eq!(
            render_template("{{name}} scored {{lead/score}}", &input),
            "Dana Woods scored 72"
        );
        assert_eq!(render_template("hi {{missing}}!", &input), "hi !");
        assert_eq!(render_template("no placeholders", &input), "no placeholders");
        assert_eq!(render_template("dangling {{open", &input), "dangling {{open");
    }

    #[test]
    fn test_update_lead_status_config_validation() {
        let action = UpdateLeadStatusAction;
        assert!(action.validate_config(&json!({ "status": "qualified" })).is_ok());
        assert!(action.validate_config(&json!({ "status": "on_fire" })).is_err());
        assert!(action.validate_config(&json!({})).is_err());
    }

    #[test]
    fn test_assign_lead_config_validation() {
        let action = AssignLeadAction;
        let ok = json!({ "user_id": uuid::Uuid::now_v7().to_string() });
        assert!(action.validate_config(&ok).is_ok());
        assert!(action.validate_config(&json!({ "user_id": "not-a-uuid" })).is_err());
    }

    #[test]
    fn test_webhook_config_validation() {
        let action = SendWebhookAction;
        assert!(action
            .validate_config(&json!({ "url": "https://example.com/hook" }))
            .is_ok());
        assert!(action.validate_config(&json!({ "url": "ftp://example.com" })).is_err());
        assert!(action.validate_config(&json!({ "url": "not a url" })).is_err());
    }

    #[test]
    fn test_calendar_event_config_validation() {
        let action = CreateCalendarEventAction;
        let ok = json!({ "summary": "Follow up", "minutes_from_now": 60, "duration_minutes": 30 });
        assert!(action.validate_config(&ok).is_ok());

        let negative = json!({ "summary": "x", "minutes_from_now": -5, "duration_minutes": 30 });
        assert!(action.validate_config(&negative).is_err());

        let zero_duration = json!({ "summary": "x", "minutes_from_now": 0, "duration_minutes": 0 });
        assert!(action.validate_config(&zero_duration).is_err());
    }
}
