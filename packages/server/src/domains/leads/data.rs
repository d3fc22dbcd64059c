//! API input types for the leads domain

use serde::{Deserialize, Serialize};

use crate::common::UserId;
use crate::domains::leads::models::{LeadSource, LeadStatus};

/// Input for creating a new lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeadInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    /// Defaults to `manual` when omitted.
    pub source: Option<LeadSource>,
    pub owner_id: Option<UserId>,
    /// Free-form custom fields.
    pub fields: Option<serde_json::Value>,
}

/// Input for updating a lead. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLeadInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub fields: Option<serde_json::Value>,
}

/// Input for a status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeStatusInput {
    pub status: LeadStatus,
}

/// Input for assignment. `owner_id: null` clears the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignLeadInput {
    pub owner_id: Option<UserId>,
}

/// Input for appending a note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNoteInput {
    pub note: String,
}
