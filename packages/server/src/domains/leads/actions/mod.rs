pub mod mutations;
pub mod queries;

pub use mutations::{add_note, assign_lead, change_lead_status, create_lead, delete_lead, update_lead};
pub use queries::{get_lead, list_activities, list_leads};
