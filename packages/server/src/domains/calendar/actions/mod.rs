//! Actions are async functions called directly from the REST handlers.

mod events;
mod google_oauth;
mod queries;
mod tokens;

pub use events::{create_event_for_lead, list_upcoming_events};
pub use google_oauth::{disconnect_google, google_connect_url, google_oauth_callback};
pub use queries::calendar_status;
pub use tokens::ensure_access_token;
