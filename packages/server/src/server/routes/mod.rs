// HTTP routes
pub mod auth;
pub mod calendar;
pub mod health;
pub mod integrations;
pub mod leads;
pub mod notifications;
pub mod roles;
pub mod users;
pub mod workflows;

pub use health::*;
