//! Google Calendar scheduling on top of the integrations connection.
//!
//! The connection itself is an [`crate::domains::integrations`] row
//! (provider `google_calendar`); this domain owns the OAuth flow, on-demand
//! token refresh, and the event endpoints used by follow-up scheduling and
//! the `action.create_calendar_event` workflow step.

pub mod actions;
pub mod data;
