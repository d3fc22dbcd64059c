//! Lead events - facts about lead state changes
//!
//! Events are immutable facts emitted by actions after their transaction
//! commits. The workflow dispatcher consumes them as triggers; each event
//! carries the id of the activity row the mutation wrote, which keys the
//! dispatch idempotency.

use crate::common::{LeadActivityId, UserId};
use crate::domains::leads::models::{Lead, LeadStatus};

/// Lead domain events
#[derive(Debug, Clone)]
pub enum LeadEvent {
    /// Lead was created (manually, via API, or by an import)
    Created {
        lead: Lead,
        activity_id: LeadActivityId,
    },

    /// Lead contact or custom fields changed
    Updated {
        lead: Lead,
        changed: Vec<String>,
        activity_id: LeadActivityId,
    },

    /// Lead moved to a new status
    StatusChanged {
        lead: Lead,
        from: LeadStatus,
        to: LeadStatus,
        activity_id: LeadActivityId,
    },

    /// Lead owner was set or cleared
    Assigned {
        lead: Lead,
        previous_owner: Option<UserId>,
        activity_id: LeadActivityId,
    },
}

impl LeadEvent {
    /// Registry key of the workflow trigger this event fires.
    pub fn trigger_type(&self) -> &'static str {
        match self {
            LeadEvent::Created { .. } => "trigger.lead_created",
            LeadEvent::Updated { .. } => "trigger.lead_updated",
            LeadEvent::StatusChanged { .. } => "trigger.lead_status_changed",
            LeadEvent::Assigned { .. } => "trigger.lead_assigned",
        }
    }

    /// The activity row the emitting mutation wrote.
    pub fn activity_id(&self) -> LeadActivityId {
        match self {
            LeadEvent::Created { activity_id, .. }
            | LeadEvent::Updated { activity_id, .. }
            | LeadEvent::StatusChanged { activity_id, .. }
            | LeadEvent::Assigned { activity_id, .. } => *activity_id,
        }
    }

    /// The lead as it looked when the event fired.
    pub fn lead(&self) -> &Lead {
        match self {
            LeadEvent::Created { lead, .. }
            | LeadEvent::Updated { lead, .. }
            | LeadEvent::StatusChanged { lead, .. }
            | LeadEvent::Assigned { lead, .. } => lead,
        }
    }

    /// Snapshot handed to workflow runs as the trigger payload.
    pub fn trigger_payload(&self) -> serde_json::Value {
        match self {
            LeadEvent::Created { lead, .. } => serde_json::json!({ "lead": lead }),
            LeadEvent::Updated { lead, changed, .. } => {
                serde_json::json!({ "lead": lead, "changed": changed })
            }
            LeadEvent::StatusChanged { lead, from, to, .. } => {
                serde_json::json!({ "lead": lead, "from": from, "to": to })
            }
            LeadEvent::Assigned {
                lead,
                previous_owner,
                ..
            } => serde_json::json!({ "lead": lead, "previous_owner": previous_owner }),
        }
    }
}
