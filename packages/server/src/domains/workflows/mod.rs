//! User-defined automation workflows.
//!
//! A workflow is a validated graph: one trigger step, action steps joined by
//! conditional connections, and field mappings that wire context values into
//! action inputs. Domain events enter through [`dispatcher`], which enqueues
//! one `workflow.execute` job per matching Active workflow; the job walks
//! the graph in [`engine::executor`] and records a run with per-step
//! history. Schedule triggers live in the process-wide cron registry and are
//! re-registered from the database at boot.

pub mod actions;
pub mod commands;
pub mod data;
pub mod dispatcher;
pub mod effects;
pub mod engine;
pub mod models;
