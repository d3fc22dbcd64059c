//! The id alias per entity. Handlers, actions and models all speak these
//! aliases; the underlying `Id<T>` never appears in signatures.

pub use super::id::Id;

// Marker types. Empty structs, one per table.

pub struct Lead;
pub struct LeadActivity;
pub struct User;
pub struct Role;
pub struct Permission;
pub struct Workflow;
pub struct WorkflowStep;
pub struct StepConnection;
pub struct FieldMapping;
pub struct WorkflowRun;
pub struct StepRun;
pub struct Integration;
pub struct Notification;
pub struct Otp;

pub type LeadId = Id<Lead>;
pub type LeadActivityId = Id<LeadActivity>;
pub type UserId = Id<User>;
pub type RoleId = Id<Role>;
pub type PermissionId = Id<Permission>;
pub type WorkflowId = Id<Workflow>;
pub type StepId = Id<WorkflowStep>;
pub type ConnectionId = Id<StepConnection>;
pub type MappingId = Id<FieldMapping>;
pub type RunId = Id<WorkflowRun>;
pub type StepRunId = Id<StepRun>;
pub type IntegrationId = Id<Integration>;
pub type NotificationId = Id<Notification>;
pub type OtpId = Id<Otp>;
