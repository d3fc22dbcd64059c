//! Staff user accounts.
//!
//! Users are the people who sign in to the CRM, not the leads it tracks.
//! Every user carries one role plus an `is_admin` flag that bypasses role
//! permission checks. The admin pool can never be emptied: demoting or
//! deactivating the last active admin is rejected.

pub mod actions;
pub mod data;
pub mod models;

pub use models::{User, UserFilter};
