// Business domains
pub mod auth;
pub mod calendar;
pub mod integrations;
pub mod leads;
pub mod notifications;
pub mod rbac;
pub mod users;
pub mod workflows;
