pub mod mutations;
pub mod queries;

pub use mutations::{create_user, update_user};
pub use queries::{get_user, list_users};
