// Shared harness and fixtures for the integration suites.

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::*;
