//! Role-based access control: roles, permissions, and their assignments.
//!
//! Permissions are a fixed catalog seeded by migrations and mirrored by
//! [`crate::common::auth::Permission`]. Roles are user-managed except
//! for the seeded system roles, which cannot be renamed or deleted.

pub mod actions;
pub mod models;

pub use models::{Permission, Role};
