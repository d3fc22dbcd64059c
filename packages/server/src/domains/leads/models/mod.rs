pub mod activity;
pub mod lead;

pub use activity::{ActivityKind, LeadActivity};
pub use lead::{Lead, LeadFilter, LeadSource, LeadStatus};
