pub mod integration;

pub use integration::{Integration, IntegrationProvider, IntegrationStatus};
