// CRM platform - API core
//
// Backend for a small-team CRM: lead capture and tracking, OTP login with
// role-based permissions, a workflow automation engine, and Facebook Lead
// Ads / Google Calendar integrations.
//
// Architecture is domain-driven: each domain under domains/ owns its
// models (SQL), actions (business logic) and effects (event reactions and
// job handlers); kernel/ holds the shared infrastructure they run on.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
