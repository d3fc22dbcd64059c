//! Resend login code action

use anyhow::{anyhow, Result};
use tracing::info;

use super::request_otp::deliver_code;
use crate::common::Identifier;
use crate::domains::auth::models::{generate_code, hash_code, Otp, OTP_MAX_RESENDS};
use crate::domains::users::models::User;
use crate::kernel::ServerDeps;

/// Result of a resend request
pub enum ResendOtpResult {
    Sent,
    NotRegistered,
    CooldownActive { retry_in_seconds: i64 },
    ResendLimitReached,
}

/// Re-deliver a login code.
///
/// Only the hash of the original code survives in storage, so a resend mints
/// a new code into the same row: same attempt count, bumped resend count,
/// extended expiry. With no live code this falls back to issuing a fresh one.
pub async fn resend_otp(raw_identifier: String, deps: &ServerDeps) -> Result<ResendOtpResult> {
    let identifier = Identifier::normalize(&raw_identifier).map_err(|e| anyhow!(e))?;

    let user = match User::find_by_identifier(&identifier.value, &deps.db_pool).await? {
        Some(user) if user.active => user,
        _ => return Ok(ResendOtpResult::NotRegistered),
    };

    let pending = match Otp::find_pending(&identifier.value, &deps.db_pool).await? {
        Some(pending) => pending,
        None => {
            Otp::delete_pending(&identifier.value, &deps.db_pool).await?;

            let code = generate_code();
            Otp::new(identifier.value.clone(), hash_code(&code))
                .insert(&deps.db_pool)
                .await?;

            deliver_code(&identifier, &code, deps).await?;

            info!(user_id = %user.id, "no live code to resend, issued a fresh one");
            return Ok(ResendOtpResult::Sent);
        }
    };

    let cooldown = pending.resend_cooldown_remaining();
    if cooldown > 0 {
        return Ok(ResendOtpResult::CooldownActive {
            retry_in_seconds: cooldown,
        });
    }

    if pending.resend_count >= OTP_MAX_RESENDS {
        return Ok(ResendOtpResult::ResendLimitReached);
    }

    let code = generate_code();
    Otp::mark_resent(pending.id, &hash_code(&code), &deps.db_pool).await?;

    deliver_code(&identifier, &code, deps).await?;

    info!(
        user_id = %user.id,
        resend_count = pending.resend_count + 1,
        "login code resent"
    );
    Ok(ResendOtpResult::Sent)
}
