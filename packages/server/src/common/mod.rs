// Common types and utilities shared across the application

pub mod auth;
pub mod entity_ids;
pub mod id;
pub mod identifier;
pub mod pagination;

pub use auth::{Actor, AuthError, HasAuthContext, Permission, ALL_PERMISSIONS};
pub use entity_ids::*;
pub use id::Id;
pub use identifier::{Identifier, IdentifierKind};
pub use pagination::{Page, PageInfo, PaginationArgs, ValidatedPaginationArgs};
