// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tokio_cron_scheduler::JobScheduler;

use super::facebook_client::{FacebookLead, FacebookPage, FacebookTokens};
use super::google_client::{CalendarEvent, CalendarEventInput, EventTime, GoogleTokens};
use super::jobs::testing::InMemoryJobQueue;
use super::jobs::JobQueue;
use super::scheduled_tasks::ScheduleRegistry;
use super::{BaseCalendarClient, BaseFacebookClient, BaseSmsService, CacheService, ServerDeps};
use crate::domains::auth::JwtService;

// =============================================================================
// Mock SMS Service
// =============================================================================

pub struct MockSmsService {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl MockSmsService {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A service whose sends always fail (for degraded-delivery tests)
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Get all (to, body) pairs that were sent
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Check if a message containing the given text was sent to a number
    pub fn was_sent_to(&self, phone_number: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|(to, _)| to == phone_number)
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, body)| body.clone())
    }
}

impl Default for MockSmsService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSmsService for MockSmsService {
    async fn send_sms(&self, phone_number: &str, body: &str) -> Result<()> {
        if self.fail {
            bail!("sms provider unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone_number.to_string(), body.to_string()));
        Ok(())
    }
}

// =============================================================================
// Mock Facebook Client
// =============================================================================

pub struct MockFacebookClient {
    leads: Arc<Mutex<Vec<FacebookLead>>>,
    pages: Arc<Mutex<Vec<FacebookPage>>>,
    subscribed_pages: Arc<Mutex<Vec<String>>>,
    exchange_calls: Arc<Mutex<Vec<String>>>,
}

impl MockFacebookClient {
    pub fn new() -> Self {
        Self {
            leads: Arc::new(Mutex::new(Vec::new())),
            pages: Arc::new(Mutex::new(Vec::new())),
            subscribed_pages: Arc::new(Mutex::new(Vec::new())),
            exchange_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a lead to be returned by `fetch_lead`
    pub fn with_lead(self, lead: FacebookLead) -> Self {
        self.leads.lock().unwrap().push(lead);
        self
    }

    /// Queue a lead built from (field name, value) pairs
    pub fn with_lead_fields(self, leadgen_id: &str, fields: Vec<(&str, &str)>) -> Self {
        use super::facebook_client::LeadField;

        let lead = FacebookLead {
            id: leadgen_id.to_string(),
            created_time: None,
            field_data: fields
                .into_iter()
                .map(|(name, value)| LeadField {
                    name: name.to_string(),
                    values: vec![value.to_string()],
                })
                .collect(),
        };
        self.leads.lock().unwrap().push(lead);
        self
    }

    pub fn with_page(self, id: &str, name: &str) -> Self {
        self.pages.lock().unwrap().push(FacebookPage {
            id: id.to_string(),
            name: name.to_string(),
            access_token: format!("page-token-{}", id),
        });
        self
    }

    /// Page IDs that were subscribed to the leadgen webhook
    pub fn subscribed_pages(&self) -> Vec<String> {
        self.subscribed_pages.lock().unwrap().clone()
    }

    pub fn exchange_calls(&self) -> Vec<String> {
        self.exchange_calls.lock().unwrap().clone()
    }
}

impl Default for MockFacebookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseFacebookClient for MockFacebookClient {
    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<FacebookTokens> {
        self.exchange_calls.lock().unwrap().push(code.to_string());
        Ok(FacebookTokens {
            access_token: format!("user-token-{}", code),
            expires_in: Some(5_184_000),
        })
    }

    async fn fetch_pages(&self, _user_token: &str) -> Result<Vec<FacebookPage>> {
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn subscribe_page(&self, page_id: &str, _page_token: &str) -> Result<()> {
        self.subscribed_pages
            .lock()
            .unwrap()
            .push(page_id.to_string());
        Ok(())
    }

    async fn fetch_lead(&self, leadgen_id: &str, _page_token: &str) -> Result<FacebookLead> {
        let leads = self.leads.lock().unwrap();
        leads
            .iter()
            .find(|l| l.id == leadgen_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("lead {} not found", leadgen_id))
    }
}

// =============================================================================
// Mock Calendar Client
// =============================================================================

pub struct MockCalendarClient {
    created_events: Arc<Mutex<Vec<CalendarEventInput>>>,
    refresh_calls: Arc<Mutex<Vec<String>>>,
    refresh_fails: bool,
}

impl MockCalendarClient {
    pub fn new() -> Self {
        Self {
            created_events: Arc::new(Mutex::new(Vec::new())),
            refresh_calls: Arc::new(Mutex::new(Vec::new())),
            refresh_fails: false,
        }
    }

    /// A client whose token refreshes fail (for expiry-degradation tests)
    pub fn with_failing_refresh() -> Self {
        Self {
            created_events: Arc::new(Mutex::new(Vec::new())),
            refresh_calls: Arc::new(Mutex::new(Vec::new())),
            refresh_fails: true,
        }
    }

    pub fn created_events(&self) -> Vec<CalendarEventInput> {
        self.created_events.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        self.refresh_calls.lock().unwrap().clone()
    }
}

impl Default for MockCalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseCalendarClient for MockCalendarClient {
    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<GoogleTokens> {
        Ok(GoogleTokens {
            access_token: format!("access-{}", code),
            expires_in: 3600,
            refresh_token: Some(format!("refresh-{}", code)),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<GoogleTokens> {
        self.refresh_calls
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        if self.refresh_fails {
            bail!("invalid_grant");
        }
        Ok(GoogleTokens {
            access_token: "refreshed-access".to_string(),
            expires_in: 3600,
            refresh_token: None,
        })
    }

    async fn create_event(
        &self,
        _access_token: &str,
        event: CalendarEventInput,
    ) -> Result<CalendarEvent> {
        let id = format!("evt-{}", self.created_events.lock().unwrap().len() + 1);
        let start = event.start.to_rfc3339();
        let end = event.end.to_rfc3339();
        let summary = event.summary.clone();
        self.created_events.lock().unwrap().push(event);

        Ok(CalendarEvent {
            id,
            summary: Some(summary),
            html_link: Some("https://calendar.google.com/event".to_string()),
            start: EventTime {
                date_time: Some(start),
                date: None,
            },
            end: EventTime {
                date_time: Some(end),
                date: None,
            },
            status: Some("confirmed".to_string()),
        })
    }

    async fn list_upcoming(
        &self,
        _access_token: &str,
        _max_results: u32,
    ) -> Result<Vec<CalendarEvent>> {
        Ok(vec![])
    }
}

// =============================================================================
// TestDependencies builder
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub sms: Arc<MockSmsService>,
    pub facebook: Arc<MockFacebookClient>,
    pub calendar: Arc<MockCalendarClient>,
    pub job_queue: Arc<InMemoryJobQueue>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            sms: Arc::new(MockSmsService::new()),
            facebook: Arc::new(MockFacebookClient::new()),
            calendar: Arc::new(MockCalendarClient::new()),
            job_queue: Arc::new(InMemoryJobQueue::new()),
        }
    }

    /// Set a mock SMS service
    pub fn mock_sms(mut self, sms: MockSmsService) -> Self {
        self.sms = Arc::new(sms);
        self
    }

    /// Set a mock Facebook client
    pub fn mock_facebook(mut self, facebook: MockFacebookClient) -> Self {
        self.facebook = Arc::new(facebook);
        self
    }

    /// Set a mock calendar client
    pub fn mock_calendar(mut self, calendar: MockCalendarClient) -> Self {
        self.calendar = Arc::new(calendar);
        self
    }

    /// Convert into ServerDeps for testing
    pub async fn into_deps(self, db_pool: PgPool) -> Arc<ServerDeps> {
        let job_queue: Arc<dyn JobQueue> = self.job_queue;
        let scheduler = JobScheduler::new()
            .await
            .expect("failed to create test scheduler");
        let schedule_registry = ScheduleRegistry::new(scheduler, job_queue.clone());

        Arc::new(ServerDeps::new(
            db_pool,
            CacheService::new(),
            job_queue,
            self.sms,
            self.facebook,
            self.calendar,
            Arc::new(JwtService::new("test-jwt-secret", "crm-test".to_string())),
            schedule_registry,
            "http://localhost:3000".to_string(),
            "test-fb-app-id".to_string(),
            "test-fb-app-secret".to_string(),
            "test-verify-token".to_string(),
            "test-google-client-id".to_string(),
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
