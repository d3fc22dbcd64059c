use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{RoleId, UserId};

/// Access tokens live this long; role changes apply on the next login.
const TOKEN_TTL_HOURS: i64 = 12;

/// Payload of an access token.
///
/// `user_id`, `role_id` and `is_admin` are snapshots from issue time.
/// The registered claims (`sub`, `exp`, `iat`, `iss`, `jti`) follow RFC 7519.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
}

/// Issues and verifies the login tokens handed out after OTP verification.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    pub fn create_token(&self, user_id: UserId, role_id: RoleId, is_admin: bool) -> Result<String> {
        let now = chrono::Utc::now();

        let claims = Claims {
            sub: user_id.to_string(),
            user_id,
            role_id,
            is_admin,
            exp: (now + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Decode a token, enforcing signature, expiry and issuer.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test_secret_key", "test_issuer".to_string())
    }

    #[test]
    fn test_round_trip_preserves_claims() {
        let jwt = service();
        let user_id = UserId::new();
        let role_id = RoleId::new();

        let token = jwt.create_token(user_id, role_id, true).unwrap();
        let claims = jwt.verify_token(&token).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role_id, role_id);
        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.is_admin);
        assert_eq!(claims.iss, "test_issuer");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(service().verify_token("not. a. token").is_err());
    }

    #[test]
    fn test_tokens_do_not_cross_secrets() {
        let signer = JwtService::new("secret_one", "test_issuer".to_string());
        let verifier = JwtService::new("secret_two", "test_issuer".to_string());

        let token = signer
            .create_token(UserId::new(), RoleId::new(), false)
            .unwrap();

        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_tokens_do_not_cross_issuers() {
        let signer = JwtService::new("shared_secret", "issuer_a".to_string());
        let verifier = JwtService::new("shared_secret", "issuer_b".to_string());

        let token = signer
            .create_token(UserId::new(), RoleId::new(), false)
            .unwrap();

        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_expiry_sits_twelve_hours_out() {
        let jwt = service();
        let token = jwt
            .create_token(UserId::new(), RoleId::new(), false)
            .unwrap();
        let claims = jwt.verify_token(&token).unwrap();

        let lifetime = claims.exp - chrono::Utc::now().timestamp();
        assert!(lifetime > 11 * 3600);
        assert!(lifetime <= 12 * 3600);
    }
}
