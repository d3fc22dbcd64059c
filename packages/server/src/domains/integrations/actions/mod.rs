//! Actions are async functions called directly from the REST handlers
//! (and, for the import job, from the job registry).

mod facebook_oauth;
mod import_lead;
mod queries;
mod webhook;

pub mod oauth_state;
pub mod token_checker;

pub use facebook_oauth::{disconnect_facebook, facebook_connect_url, facebook_oauth_callback};
pub use import_lead::import_facebook_lead;
pub use queries::{get_integration_summary, list_integrations};
pub use webhook::{receive_leadgen, verify_subscription, LeadgenWebhookResult};
