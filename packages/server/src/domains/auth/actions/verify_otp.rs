//! Verify login code action

use anyhow::{anyhow, Result};
use tracing::info;

use crate::common::Identifier;
use crate::domains::auth::models::{hash_code, Otp, OTP_MAX_ATTEMPTS};
use crate::domains::users::models::User;
use crate::kernel::ServerDeps;

/// Result of verifying a login code
pub enum VerifyOtpResult {
    Verified { token: String, user: User },
    InvalidCode,
    LockedOut,
}

/// Verify a login code and issue a session token.
///
/// Unknown identifier, missing code, expired code, and consumed code all
/// collapse into `InvalidCode`; the response never reveals which. A wrong
/// code counts against the attempt budget and locks the code when spent.
pub async fn verify_otp(
    raw_identifier: String,
    code: String,
    deps: &ServerDeps,
) -> Result<VerifyOtpResult> {
    let identifier = Identifier::normalize(&raw_identifier).map_err(|e| anyhow!(e))?;

    let user = match User::find_by_identifier(&identifier.value, &deps.db_pool).await? {
        Some(user) if user.active => user,
        _ => return Ok(VerifyOtpResult::InvalidCode),
    };

    let otp = match Otp::find_pending(&identifier.value, &deps.db_pool).await? {
        Some(otp) => otp,
        None => return Ok(VerifyOtpResult::InvalidCode),
    };

    if otp.is_locked() {
        return Ok(VerifyOtpResult::LockedOut);
    }

    if otp.code_hash != hash_code(code.trim()) {
        let attempts = Otp::record_attempt(otp.id, &deps.db_pool).await?;
        if attempts >= OTP_MAX_ATTEMPTS {
            info!(user_id = %user.id, "login code locked after too many attempts");
            return Ok(VerifyOtpResult::LockedOut);
        }
        return Ok(VerifyOtpResult::InvalidCode);
    }

    Otp::mark_consumed(otp.id, &deps.db_pool).await?;

    let token = deps
        .jwt_service
        .create_token(user.id, user.role_id, user.is_admin)?;

    info!(user_id = %user.id, "user logged in");
    Ok(VerifyOtpResult::Verified { token, user })
}
