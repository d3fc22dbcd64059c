pub mod actions;
pub mod condition;
pub mod executor;
pub mod mapping;
pub mod validate;

pub use actions::{ActionHandler, ActionRegistry};
pub use validate::validate_graph;
