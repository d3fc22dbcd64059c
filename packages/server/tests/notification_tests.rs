//! Integration tests for in-app notifications.
//!
//! Covers the Notifier trait (row plus best-effort SMS for phone
//! identifiers), newest-first pagination, and owner-scoped read marking.

mod common;

use common::{fixtures, TestHarness};
use crm_core::common::pagination::PaginationArgs;
use crm_core::common::{NotificationId, UserId};
use crm_core::domains::notifications::actions::{list_notifications, mark_notification_read};
use crm_core::kernel::test_dependencies::MockSmsService;
use crm_core::kernel::traits::Notifier;
use crm_core::kernel::TestDependencies;
use serde_json::json;
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn notify_writes_an_in_app_row_without_sms_for_email_users(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let role_id = fixtures::create_test_role(&ctx.db_pool, "inbox").await.unwrap();
    let user = fixtures::create_test_user(
        &ctx.db_pool,
        "Inbox Owner",
        &fixtures::unique_email("inbox"),
        role_id,
    )
    .await
    .unwrap();

    deps.notify(
        user,
        "Pipeline review",
        "Three leads are waiting on you",
        json!({ "count": 3 }),
    )
    .await
    .unwrap();

    let page = list_notifications(user, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "Pipeline review");
    assert_eq!(page.items[0].body, "Three leads are waiting on you");
    assert_eq!(page.items[0].payload, json!({ "count": 3 }));
    assert!(page.items[0].read_at.is_none());

    assert!(sms.sent_messages().is_empty());

    let err = deps
        .notify(UserId::new(), "Ghost", "Nobody home", json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("User not found"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn notify_rides_along_as_sms_for_phone_users(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let role_id = fixtures::create_test_role(&ctx.db_pool, "field").await.unwrap();
    let phone = fixtures::unique_phone();
    let user = fixtures::create_test_user(&ctx.db_pool, "Field Rep", &phone, role_id)
        .await
        .unwrap();

    deps.notify(
        user,
        "Lead assigned",
        "Lead \"Dana Woods\" was assigned to you",
        json!({}),
    )
    .await
    .unwrap();

    assert!(sms.was_sent_to(&phone));
    assert_eq!(
        sms.last_body().unwrap(),
        "Lead \"Dana Woods\" was assigned to you"
    );

    // SMS delivery is best-effort: a provider outage never loses the row.
    let failing_deps = TestDependencies::new()
        .mock_sms(MockSmsService::failing())
        .into_deps(ctx.db_pool.clone())
        .await;

    failing_deps
        .notify(user, "Follow-up", "Still lands in the inbox", json!({}))
        .await
        .unwrap();

    let page = list_notifications(user, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title, "Follow-up");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn notifications_paginate_newest_first(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;

    let role_id = fixtures::create_test_role(&ctx.db_pool, "pager").await.unwrap();
    let user = fixtures::create_test_user(
        &ctx.db_pool,
        "Pager",
        &fixtures::unique_email("pager"),
        role_id,
    )
    .await
    .unwrap();

    for title in ["First", "Second", "Third"] {
        deps.notify(user, title, "body", json!({})).await.unwrap();
    }

    let page = list_notifications(user, PaginationArgs::forward(2, None), &deps)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title, "Third");
    assert_eq!(page.items[1].title, "Second");
    assert!(page.page_info.has_next_page);

    let rest = list_notifications(
        user,
        PaginationArgs::forward(2, page.page_info.end_cursor.clone()),
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].title, "First");
    assert!(!rest.page_info.has_next_page);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn marking_read_is_scoped_to_the_owner(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;

    let role_id = fixtures::create_test_role(&ctx.db_pool, "reader").await.unwrap();
    let owner = fixtures::create_test_user(
        &ctx.db_pool,
        "Owner",
        &fixtures::unique_email("owner"),
        role_id,
    )
    .await
    .unwrap();
    let intruder = fixtures::create_test_user(
        &ctx.db_pool,
        "Intruder",
        &fixtures::unique_email("intruder"),
        role_id,
    )
    .await
    .unwrap();

    deps.notify(owner, "Private", "Only yours", json!({}))
        .await
        .unwrap();
    let page = list_notifications(owner, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    let id = page.items[0].id;

    let err = mark_notification_read(id, intruder, &deps).await.unwrap_err();
    assert!(err.to_string().contains("Notification not found"));

    mark_notification_read(id, owner, &deps).await.unwrap();
    let page = list_notifications(owner, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    let first_read_at = page.items[0].read_at.expect("marked read");

    // Re-marking is a no-op, not an error.
    mark_notification_read(id, owner, &deps).await.unwrap();
    let page = list_notifications(owner, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(page.items[0].read_at, Some(first_read_at));

    let err = mark_notification_read(NotificationId::new(), owner, &deps)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Notification not found"));
}
