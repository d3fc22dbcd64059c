//! Integration tests for Google Calendar scheduling.
//!
//! Covers event input validation, the OAuth connect flow, on-demand token
//! refresh (including refresh failures degrading the connection health),
//! the lead-timeline activity each event leaves behind, and disconnect.

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{fixtures, TestHarness};
use crm_core::common::pagination::PaginationArgs;
use crm_core::common::LeadId;
use crm_core::domains::calendar::actions::{
    create_event_for_lead, disconnect_google, google_oauth_callback, list_upcoming_events,
};
use crm_core::domains::calendar::data::CreateEventInput;
use crm_core::domains::integrations::actions::oauth_state;
use crm_core::domains::integrations::models::{
    Integration, IntegrationProvider, IntegrationStatus,
};
use crm_core::domains::leads::actions::list_activities;
use crm_core::domains::leads::models::ActivityKind;
use crm_core::kernel::test_dependencies::MockCalendarClient;
use crm_core::kernel::TestDependencies;
use serde_json::json;
use test_context::test_context;

fn event_input(
    lead_id: LeadId,
    summary: &str,
    start: DateTime<Utc>,
    duration_minutes: i64,
) -> CreateEventInput {
    CreateEventInput {
        lead_id,
        summary: summary.to_string(),
        start,
        duration_minutes,
    }
}

async fn expire_stored_token(ctx: &TestHarness, integration: &Integration) {
    sqlx::query(
        "UPDATE integrations SET credentials = jsonb_set(credentials, '{expires_at}', to_jsonb($1::text)) WHERE id = $2",
    )
    .bind((Utc::now() - Duration::hours(2)).to_rfc3339())
    .bind(integration.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();
}

// =============================================================================
// Input Validation Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn event_inputs_are_validated_before_anything_runs(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let lead_id = fixtures::create_test_lead(&ctx.db_pool, "Calendar Lead")
        .await
        .unwrap();

    let err = create_event_for_lead(event_input(lead_id, "   ", Utc::now(), 30), None, &deps)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Event summary is invalid"));

    let err = create_event_for_lead(
        event_input(lead_id, "Kickoff call", Utc::now(), 0),
        None,
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Event duration must be positive"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn scheduling_against_an_unknown_lead_fails(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;

    let err = create_event_for_lead(
        event_input(LeadId::new(), "Kickoff call", Utc::now(), 30),
        None,
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Lead not found"));
}

// =============================================================================
// Integration Lifecycle
// =============================================================================

/// The integrations table keeps a single row per provider, so every scenario
/// that depends on the Google Calendar row's state (connect, token refresh,
/// health degradation, disconnect) runs here in sequence. The validation
/// tests above bail before reaching that row and stay parallel-safe.
#[test_context(TestHarness)]
#[tokio::test]
async fn google_calendar_lifecycle_from_oauth_to_disconnect(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let calendar = test_deps.calendar.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let role_id = fixtures::create_test_role(&ctx.db_pool, "scheduler").await.unwrap();
    let actor = fixtures::create_test_user(
        &ctx.db_pool,
        "Scheduler",
        &fixtures::unique_email("scheduler"),
        role_id,
    )
    .await
    .unwrap();
    let lead_id = fixtures::create_test_lead(&ctx.db_pool, "Morgan Ellis")
        .await
        .unwrap();

    let start = Utc::now() + Duration::days(1);

    // Nothing is connected yet.
    let err = create_event_for_lead(
        event_input(lead_id, "Kickoff call", start, 45),
        Some(actor),
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Google Calendar is not connected"));

    // The OAuth callback only honors states it minted itself.
    let err = google_oauth_callback("g-code-1", "bogus-state", &deps)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Invalid or expired OAuth state"));

    let state = oauth_state::issue_state("google_calendar", &deps).await;
    let integration = google_oauth_callback("g-code-1", &state, &deps).await.unwrap();

    assert_eq!(integration.provider, IntegrationProvider::GoogleCalendar);
    assert_eq!(integration.status, IntegrationStatus::Connected);
    assert_eq!(integration.name, "Google Calendar");
    assert_eq!(integration.credentials["access_token"], json!("access-g-code-1"));
    assert_eq!(integration.credentials["refresh_token"], json!("refresh-g-code-1"));

    // The freshly exchanged token is still valid, so no refresh happens.
    let event = create_event_for_lead(
        event_input(lead_id, "Kickoff call", start, 45),
        Some(actor),
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(event.id, "evt-1");
    assert_eq!(event.summary.as_deref(), Some("Kickoff call"));
    assert!(event.html_link.is_some());
    assert!(calendar.refresh_calls().is_empty());

    let created = calendar.created_events();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].summary, "Kickoff call");
    assert_eq!(created[0].start, start);
    assert_eq!(created[0].end, start + Duration::minutes(45));
    let description = created[0].description.clone().unwrap();
    assert!(description.contains("Morgan Ellis"));
    assert!(description.contains(&lead_id.to_string()));

    let trail = list_activities(lead_id, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(trail.items.len(), 1);
    assert_eq!(trail.items[0].kind, ActivityKind::CalendarEventScheduled);
    assert_eq!(trail.items[0].actor_id, Some(actor));
    assert_eq!(trail.items[0].detail["event_id"], json!("evt-1"));
    assert_eq!(trail.items[0].detail["summary"], json!("Kickoff call"));

    let upcoming = list_upcoming_events(10, &deps).await.unwrap();
    assert!(upcoming.is_empty());

    // An expired token gets refreshed in place before the API call.
    expire_stored_token(ctx, &integration).await;

    let event = create_event_for_lead(
        event_input(lead_id, "Follow-up", start, 30),
        Some(actor),
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(event.id, "evt-2");
    assert_eq!(calendar.refresh_calls(), vec!["refresh-g-code-1".to_string()]);

    let integration = Integration::find_by_provider(IntegrationProvider::GoogleCalendar, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(integration.credentials["access_token"], json!("refreshed-access"));
    // Google omits the refresh token on renewal; the stored one survives.
    assert_eq!(integration.credentials["refresh_token"], json!("refresh-g-code-1"));
    assert_eq!(integration.health["status"], json!("ok"));

    // A failing refresh surfaces the error and degrades the health record.
    let failing_deps = TestDependencies::new()
        .mock_calendar(MockCalendarClient::with_failing_refresh())
        .into_deps(ctx.db_pool.clone())
        .await;

    expire_stored_token(ctx, &integration).await;

    let err = create_event_for_lead(
        event_input(lead_id, "Requalification", start, 30),
        Some(actor),
        &failing_deps,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("invalid_grant"));

    let integration = Integration::find_by_provider(IntegrationProvider::GoogleCalendar, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(integration.health["status"], json!("error"));
    let message = integration.health["recent_errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("token refresh failed"));

    // Disconnecting keeps the row but blocks every calendar call.
    let integration = disconnect_google(&deps).await.unwrap();
    assert_eq!(integration.status, IntegrationStatus::Disconnected);

    let err = create_event_for_lead(
        event_input(lead_id, "One more", start, 30),
        Some(actor),
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("reconnect it"));
}
