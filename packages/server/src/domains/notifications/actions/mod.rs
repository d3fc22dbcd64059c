pub mod queries;

pub use queries::{list_notifications, mark_notification_read};
