pub mod event_handlers;
pub mod job_handlers;

pub use event_handlers::{handle_integration_event, INTEGRATIONS_CACHE_TAG};
pub use job_handlers::register_integration_jobs;

use tracing::error;

use crate::domains::integrations::events::IntegrationEvent;
use crate::kernel::ServerDeps;

/// Hand a committed integration event to its effect. Failures are logged,
/// not bubbled; the state change itself already committed.
pub(crate) async fn dispatch(event: IntegrationEvent, deps: &ServerDeps) {
    if let Err(e) = handle_integration_event(&event, deps).await {
        error!(
            error = %e,
            provider = %event.provider(),
            "integration event effect failed"
        );
    }
}
