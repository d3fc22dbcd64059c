//! Background job handlers owned by the integrations domain.

use crate::domains::integrations::actions::import_facebook_lead;
use crate::domains::integrations::commands::ImportFacebookLeadCommand;

pub fn register_integration_jobs(registry: &mut crate::kernel::jobs::JobRegistry) {
    registry.register::<ImportFacebookLeadCommand, _, _>(
        ImportFacebookLeadCommand::JOB_TYPE,
        |command, deps| async move { import_facebook_lead(command, &deps).await },
    );
}
