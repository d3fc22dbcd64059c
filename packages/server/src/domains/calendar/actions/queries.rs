use anyhow::Result;

use crate::domains::integrations::actions::get_integration_summary;
use crate::domains::integrations::data::IntegrationSummary;
use crate::domains::integrations::models::IntegrationProvider;
use crate::kernel::ServerDeps;

/// Connection summary for the calendar status endpoint.
pub async fn calendar_status(deps: &ServerDeps) -> Result<IntegrationSummary> {
    get_integration_summary(IntegrationProvider::GoogleCalendar, deps).await
}
