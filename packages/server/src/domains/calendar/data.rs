use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::LeadId;

/// Request body for scheduling a follow-up event against a lead.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub lead_id: LeadId,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
}
