//! In-app notifications with best-effort SMS fan-out.

pub mod actions;
pub mod models;
pub mod notifier;

pub use models::Notification;
pub use notifier::notify_admins;
