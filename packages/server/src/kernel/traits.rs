//! Seams between the domains and the outside world.
//!
//! Each external service gets one `Base*` trait here; production wires the
//! real clients in, tests wire mocks. Nothing in this module knows about
//! leads or workflows. The behavior that does (e.g. "import a lead") lives
//! in domain actions that call through these traits.

use anyhow::Result;
use async_trait::async_trait;

use crate::kernel::facebook_client::{FacebookLead, FacebookPage, FacebookTokens};
use crate::kernel::google_client::{CalendarEvent, CalendarEventInput, GoogleTokens};

/// OTP and alert delivery.
#[async_trait]
pub trait BaseSmsService: Send + Sync {
    /// Send an SMS to an E.164 phone number
    async fn send_sms(&self, phone_number: &str, body: &str) -> Result<()>;
}

/// Facebook Graph calls used by the Lead Ads integration.
#[async_trait]
pub trait BaseFacebookClient: Send + Sync {
    /// Exchange an OAuth code for a user access token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<FacebookTokens>;

    /// List pages the user manages (with per-page access tokens)
    async fn fetch_pages(&self, user_token: &str) -> Result<Vec<FacebookPage>>;

    /// Subscribe a page to the app's leadgen webhook
    async fn subscribe_page(&self, page_id: &str, page_token: &str) -> Result<()>;

    /// Fetch a submitted lead's field data by leadgen id
    async fn fetch_lead(&self, leadgen_id: &str, page_token: &str) -> Result<FacebookLead>;
}

/// In-app notification fan-out.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Record an in-app notification for a user, then attempt SMS delivery
    /// when the user's identifier is a phone number. SMS failures are logged
    /// and never propagated.
    async fn notify(
        &self,
        user_id: crate::common::UserId,
        title: &str,
        body: &str,
        payload: serde_json::Value,
    ) -> Result<()>;
}

/// Google Calendar OAuth and event calls.
#[async_trait]
pub trait BaseCalendarClient: Send + Sync {
    /// Exchange an OAuth code for access + refresh tokens
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<GoogleTokens>;

    /// Mint a fresh access token from a refresh token
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<GoogleTokens>;

    /// Insert an event into the user's primary calendar
    async fn create_event(
        &self,
        access_token: &str,
        event: CalendarEventInput,
    ) -> Result<CalendarEvent>;

    /// List upcoming events from the primary calendar
    async fn list_upcoming(&self, access_token: &str, max_results: u32)
        -> Result<Vec<CalendarEvent>>;
}
