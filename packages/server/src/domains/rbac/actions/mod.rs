pub mod manage_roles;
pub mod sync_permissions;

pub use manage_roles::{create_role, delete_role, update_role};
pub use sync_permissions::sync_role_permissions;
