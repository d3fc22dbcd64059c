//! Minimal Twilio Messages API client. Message bodies are composed by the
//! caller; this crate only delivers SMS.

pub mod models;

use reqwest::Client;
use thiserror::Error;

use crate::models::MessageResponse;

const API_BASE: &str = "https://api.twilio.com/2010-04-01/Accounts";

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("twilio request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("twilio rejected the message ({status}): {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    /// Send a single SMS. `to` must be E.164.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<MessageResponse, TwilioError> {
        let url = format!("{}/{}/Messages.json", API_BASE, self.options.account_sid);
        let form = [
            ("To", to),
            ("From", self.options.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(url)
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %body, "twilio returned an error");
            return Err(TwilioError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<MessageResponse>().await?)
    }
}
