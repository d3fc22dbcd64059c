//! API input types for the users domain

use serde::{Deserialize, Serialize};

use crate::common::RoleId;

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    /// Phone number or email address, normalized before storage.
    pub identifier: String,
    pub role_id: RoleId,
    #[serde(default)]
    pub is_admin: bool,
}

/// Input for updating a user. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub role_id: Option<RoleId>,
    pub is_admin: Option<bool>,
    pub active: Option<bool>,
}
