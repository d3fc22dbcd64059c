use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::common::OtpId;

/// Code lifetime from generation (and from each resend).
pub const OTP_TTL_MINUTES: i64 = 10;
/// Wrong-code attempts before a code locks.
pub const OTP_MAX_ATTEMPTS: i32 = 5;
/// Resends allowed per code row.
pub const OTP_MAX_RESENDS: i32 = 5;
/// Seconds between resends.
const OTP_RESEND_COOLDOWN_SECONDS: i64 = 60;

/// What a one-time code is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "otp_purpose", rename_all = "snake_case")]
pub enum OtpPurpose {
    #[default]
    Login,
}

/// One-time login code.
///
/// Only the SHA-256 hash of the code is stored; the plaintext exists just
/// long enough to be delivered. A resend therefore mints a new code into the
/// same row rather than re-sending the old one.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Otp {
    pub id: OtpId,
    /// Normalized login identifier the code was sent to.
    pub identifier: String,
    pub code_hash: String,
    pub purpose: OtpPurpose,
    pub attempts: i32,
    pub resend_count: i32,
    pub last_sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Generate a 6-digit login code
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Hash a login code with SHA-256
///
/// Codes are hashed before storage so a database read never exposes a
/// usable code.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Otp {
    pub fn new(identifier: String, code_hash: String) -> Self {
        let now = Utc::now();
        Otp {
            id: OtpId::new(),
            identifier,
            code_hash,
            purpose: OtpPurpose::Login,
            attempts: 0,
            resend_count: 0,
            last_sent_at: now,
            expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
            consumed_at: None,
            created_at: now,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.attempts >= OTP_MAX_ATTEMPTS
    }

    /// Seconds until another resend is allowed, zero if allowed now.
    pub fn resend_cooldown_remaining(&self) -> i64 {
        let next_allowed = self.last_sent_at + Duration::seconds(OTP_RESEND_COOLDOWN_SECONDS);
        (next_allowed - Utc::now()).num_seconds().max(0)
    }

    /// Insert new code row
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO otps (
                id,
                identifier,
                code_hash,
                purpose,
                attempts,
                resend_count,
                last_sent_at,
                expires_at,
                consumed_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *",
        )
        .bind(self.id)
        .bind(&self.identifier)
        .bind(&self.code_hash)
        .bind(self.purpose)
        .bind(self.attempts)
        .bind(self.resend_count)
        .bind(self.last_sent_at)
        .bind(self.expires_at)
        .bind(self.consumed_at)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Find the live (unconsumed, unexpired) code for an identifier
    pub async fn find_pending(identifier: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM otps
             WHERE identifier = $1
               AND consumed_at IS NULL
               AND expires_at > NOW()
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Drop any unconsumed codes for an identifier, live or expired.
    /// Issuing a fresh code always starts from a clean slate.
    pub async fn delete_pending(identifier: &str, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM otps WHERE identifier = $1 AND consumed_at IS NULL")
            .bind(identifier)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Record a failed verification attempt, returning the new attempt count
    pub async fn record_attempt(id: OtpId, pool: &PgPool) -> Result<i32> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE otps SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Mark a code as consumed so it can never verify again
    pub async fn mark_consumed(id: OtpId, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE otps SET consumed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Swap in a freshly minted code on resend: new hash, extended expiry,
    /// bumped resend count, cooldown clock restarted.
    pub async fn mark_resent(id: OtpId, new_code_hash: &str, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE otps
             SET code_hash = $2,
                 resend_count = resend_count + 1,
                 last_sent_at = NOW(),
                 expires_at = NOW() + ($3 || ' minutes')::INTERVAL
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(new_code_hash)
        .bind(OTP_TTL_MINUTES.to_string())
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Delete consumed and expired codes. Runs on a 15 minute schedule.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM otps WHERE consumed_at IS NOT NULL OR expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
