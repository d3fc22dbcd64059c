use serde::Deserialize;

/// Subset of the Messages API response we care about.
/// https://www.twilio.com/docs/sms/api/message-resource
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
    pub to: String,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}
