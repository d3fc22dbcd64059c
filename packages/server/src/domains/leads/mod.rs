//! Leads domain - sales prospects and their activity trail
//!
//! Every state-changing operation writes exactly one activity row in the
//! same transaction as the lead mutation, then emits a fact event that the
//! workflow dispatcher picks up as a trigger.

pub mod actions;
pub mod data;
pub mod events;
pub mod models;

pub use events::LeadEvent;
pub use models::{ActivityKind, Lead, LeadActivity, LeadFilter, LeadSource, LeadStatus};
