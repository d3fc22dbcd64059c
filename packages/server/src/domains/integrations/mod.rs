//! Third-party provider connections, currently Facebook Lead Ads and
//! Google Calendar.
//!
//! Each provider is one [`models::Integration`] row carrying credentials,
//! health, and sync stats. Facebook leads arrive through a signed webhook
//! that enqueues `facebook.import_lead` jobs; an hourly checker refreshes
//! expiring Google tokens and flags everything else as `token_expired`.
//! The calendar domain reuses the OAuth state cache and models from here.

pub mod actions;
pub mod commands;
pub mod data;
pub mod effects;
pub mod events;
pub mod models;
