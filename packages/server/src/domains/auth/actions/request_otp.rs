//! Request login code action

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::common::{Identifier, IdentifierKind};
use crate::domains::auth::models::{generate_code, hash_code, Otp, OTP_TTL_MINUTES};
use crate::domains::users::models::User;
use crate::kernel::ServerDeps;

/// Result of requesting a login code
pub enum RequestOtpResult {
    Sent,
    NotRegistered,
}

/// Issue a fresh login code for an identifier and deliver it.
///
/// Any earlier unconsumed codes for the identifier are dropped first, so at
/// most one code is live at a time. Returns `NotRegistered` when no active
/// user holds the identifier (not an error).
pub async fn request_otp(raw_identifier: String, deps: &ServerDeps) -> Result<RequestOtpResult> {
    let identifier = Identifier::normalize(&raw_identifier).map_err(|e| anyhow!(e))?;

    let user = match User::find_by_identifier(&identifier.value, &deps.db_pool).await? {
        Some(user) if user.active => user,
        _ => {
            info!("login code requested for unregistered identifier");
            return Ok(RequestOtpResult::NotRegistered);
        }
    };

    Otp::delete_pending(&identifier.value, &deps.db_pool).await?;

    let code = generate_code();
    Otp::new(identifier.value.clone(), hash_code(&code))
        .insert(&deps.db_pool)
        .await?;

    deliver_code(&identifier, &code, deps).await?;

    info!(user_id = %user.id, "login code sent");
    Ok(RequestOtpResult::Sent)
}

/// Deliver a plaintext code over the channel the identifier implies.
///
/// Phones go through the SMS service. No mail provider is configured, so for
/// email identifiers the code is surfaced in the log in debug builds only.
pub(crate) async fn deliver_code(
    identifier: &Identifier,
    code: &str,
    deps: &ServerDeps,
) -> Result<()> {
    match identifier.kind {
        IdentifierKind::Phone => {
            let body = format!(
                "Your verification code is {}. It expires in {} minutes.",
                code, OTP_TTL_MINUTES
            );
            deps.sms.send_sms(&identifier.value, &body).await
        }
        IdentifierKind::Email => {
            warn!(
                identifier = %identifier.value,
                "email delivery not configured, login code not sent"
            );
            #[cfg(debug_assertions)]
            info!("login code for {}: {}", identifier.value, code);
            Ok(())
        }
    }
}
