//! Job commands owned by the integrations domain.

use serde::{Deserialize, Serialize};

use crate::kernel::jobs::CommandMeta;

/// Import one submitted Facebook lead by leadgen id.
///
/// Enqueued by the leadgen webhook; the idempotency key absorbs Facebook's
/// webhook redeliveries while the job is still in flight, and the handler
/// itself skips leads it has already imported (external_ref lookup) for
/// redeliveries that arrive later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFacebookLeadCommand {
    pub leadgen_id: String,
    pub form_id: Option<String>,
    pub page_id: Option<String>,
}

impl ImportFacebookLeadCommand {
    pub const JOB_TYPE: &'static str = "facebook.import_lead";
}

impl CommandMeta for ImportFacebookLeadCommand {
    fn command_type(&self) -> &'static str {
        Self::JOB_TYPE
    }

    fn idempotency_key(&self) -> Option<String> {
        Some(format!("fb-lead:{}", self.leadgen_id))
    }
}
