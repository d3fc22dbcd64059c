use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Secret for signing login tokens
    pub jwt_secret: String,
    /// `iss` claim stamped into login tokens
    pub jwt_issuer: String,
    /// Base URL this API is served from, used to build OAuth redirect URIs
    pub public_base_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
    /// Facebook app credentials (Lead Ads integration)
    pub facebook_app_id: String,
    pub facebook_app_secret: String,
    /// Token echoed back during the webhook verification handshake
    pub facebook_webhook_verify_token: String,
    /// Google OAuth client (Calendar integration)
    pub google_client_id: String,
    pub google_client_secret: String,
}

impl Config {
    /// Read the environment, falling back to a `.env` file in development.
    ///
    /// Integration credentials default to empty: the server boots without
    /// them and the affected connect flows report themselves unconfigured.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "crm-api".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_from_number: env::var("TWILIO_FROM_NUMBER")
                .context("TWILIO_FROM_NUMBER must be set")?,
            facebook_app_id: env::var("FACEBOOK_APP_ID").unwrap_or_default(),
            facebook_app_secret: env::var("FACEBOOK_APP_SECRET").unwrap_or_default(),
            facebook_webhook_verify_token: env::var("FACEBOOK_WEBHOOK_VERIFY_TOKEN")
                .unwrap_or_default(),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
        })
    }
}
