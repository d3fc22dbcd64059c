use std::fmt;
use std::str::FromStr;

/// Permissions in the CRM platform.
///
/// Each variant maps to one row in the `permissions` table (seeded by
/// migration). Roles hold a subset of these keys; authorization checks
/// resolve the actor's role to its key set and test membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read leads and their activity trails
    LeadsView,

    /// Create, update and delete leads
    LeadsManage,

    /// Assign leads to owners
    LeadsAssign,

    /// Invite and manage users
    UsersManage,

    /// Create roles and sync their permission sets
    RolesManage,

    /// Read workflows and their run history
    WorkflowsView,

    /// Create, update, activate and archive workflows
    WorkflowsManage,

    /// Connect, disconnect and inspect integrations
    IntegrationsManage,

    /// Connect the calendar and schedule events
    CalendarManage,
}

/// Every permission, in catalog order. Used by the seed migration check
/// and the `/permissions` listing.
pub const ALL_PERMISSIONS: [Permission; 9] = [
    Permission::LeadsView,
    Permission::LeadsManage,
    Permission::LeadsAssign,
    Permission::UsersManage,
    Permission::RolesManage,
    Permission::WorkflowsView,
    Permission::WorkflowsManage,
    Permission::IntegrationsManage,
    Permission::CalendarManage,
];

impl Permission {
    /// The stable string key stored in the database and used in API payloads.
    pub fn as_key(&self) -> &'static str {
        match self {
            Permission::LeadsView => "leads.view",
            Permission::LeadsManage => "leads.manage",
            Permission::LeadsAssign => "leads.assign",
            Permission::UsersManage => "users.manage",
            Permission::RolesManage => "roles.manage",
            Permission::WorkflowsView => "workflows.view",
            Permission::WorkflowsManage => "workflows.manage",
            Permission::IntegrationsManage => "integrations.manage",
            Permission::CalendarManage => "calendar.manage",
        }
    }

    /// Human-readable description for the permission catalog endpoint.
    pub fn description(&self) -> &'static str {
        match self {
            Permission::LeadsView => "View leads and their activity",
            Permission::LeadsManage => "Create, update and delete leads",
            Permission::LeadsAssign => "Assign leads to owners",
            Permission::UsersManage => "Invite and manage users",
            Permission::RolesManage => "Manage roles and their permissions",
            Permission::WorkflowsView => "View workflows and run history",
            Permission::WorkflowsManage => "Create and manage workflows",
            Permission::IntegrationsManage => "Manage external integrations",
            Permission::CalendarManage => "Connect the calendar and schedule events",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PERMISSIONS
            .iter()
            .find(|p| p.as_key() == s)
            .copied()
            .ok_or_else(|| format!("Unknown permission key: {}", s))
    }
}
