//! Thin Google OAuth + Calendar API client.
//!
//! Token exchange, token refresh, one event insert and one event list. The
//! calendar is always the connected account's primary calendar.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BaseCalendarClient;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Scope needed to create and list events
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

/// Google OAuth client for Calendar access
pub struct GoogleClient {
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

/// Token response from the OAuth endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
    /// Only present on the initial exchange with `access_type=offline`
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The event fields we set when scheduling a follow-up
#[derive(Debug, Clone)]
pub struct CalendarEventInput {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct EventTimeBody {
    #[serde(rename = "dateTime")]
    date_time: String,
}

#[derive(Debug, Serialize)]
struct EventBody {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: EventTimeBody,
    end: EventTimeBody,
}

/// Start or end of an event. All-day events carry `date` instead of `date_time`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventTime {
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// A calendar event as returned by the API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(rename = "htmlLink", default)]
    pub html_link: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

/// Build the Google consent screen URL for the OAuth flow.
///
/// `access_type=offline` + `prompt=consent` makes Google return a refresh
/// token on the exchange, which the hourly token check depends on.
pub fn oauth_consent_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(CALENDAR_SCOPE),
        urlencoding::encode(state),
    )
}

impl GoogleClient {
    /// Create a new Google OAuth client
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client_id,
            client_secret,
            client,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<GoogleTokens> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(form)
            .send()
            .await
            .context("Failed to send Google token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google token endpoint error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Google token response")
    }
}

#[async_trait]
impl BaseCalendarClient for GoogleClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<GoogleTokens> {
        self.token_request(&[
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<GoogleTokens> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn create_event(
        &self,
        access_token: &str,
        event: CalendarEventInput,
    ) -> Result<CalendarEvent> {
        let body = EventBody {
            summary: event.summary,
            description: event.description,
            start: EventTimeBody {
                date_time: event.start.to_rfc3339(),
            },
            end: EventTimeBody {
                date_time: event.end.to_rfc3339(),
            },
        };

        let response = self
            .client
            .post(format!("{}/calendars/primary/events", CALENDAR_BASE))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send Calendar insert request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Calendar API error {}: {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Calendar event response")
    }

    async fn list_upcoming(
        &self,
        access_token: &str,
        max_results: u32,
    ) -> Result<Vec<CalendarEvent>> {
        let time_min = Utc::now().to_rfc3339();
        let url = format!(
            "{}/calendars/primary/events?maxResults={}&orderBy=startTime&singleEvents=true&timeMin={}",
            CALENDAR_BASE,
            max_results,
            urlencoding::encode(&time_min),
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send Calendar list request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Calendar API error {}: {}", status, body);
        }

        let list: EventListResponse = response
            .json()
            .await
            .context("Failed to parse Calendar list response")?;
        Ok(list.items)
    }
}

/// No-op client for testing or when the Google app is not configured
pub struct NoopCalendarClient;

#[async_trait]
impl BaseCalendarClient for NoopCalendarClient {
    async fn exchange_code(&self, _code: &str, _redirect_uri: &str) -> Result<GoogleTokens> {
        anyhow::bail!("Google OAuth client not configured")
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<GoogleTokens> {
        anyhow::bail!("Google OAuth client not configured")
    }

    async fn create_event(
        &self,
        _access_token: &str,
        _event: CalendarEventInput,
    ) -> Result<CalendarEvent> {
        anyhow::bail!("Google OAuth client not configured")
    }

    async fn list_upcoming(
        &self,
        _access_token: &str,
        _max_results: u32,
    ) -> Result<Vec<CalendarEvent>> {
        anyhow::bail!("Google OAuth client not configured")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_url_requests_offline_access() {
        let url = oauth_consent_url("cid", "https://crm.example.com/cb", "nonce");
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=nonce"));
        assert!(url.contains(&urlencoding::encode(CALENDAR_SCOPE).into_owned()));
    }

    #[test]
    fn test_event_parses_all_day_shape() {
        let event: CalendarEvent = serde_json::from_value(serde_json::json!({
            "id": "evt1",
            "summary": "Follow up",
            "start": {"date": "2024-06-01"},
            "end": {"date": "2024-06-02"}
        }))
        .unwrap();

        assert_eq!(event.start.date.as_deref(), Some("2024-06-01"));
        assert!(event.start.date_time.is_none());
    }
}
