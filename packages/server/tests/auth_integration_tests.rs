//! Integration tests for the OTP login flow.
//!
//! Covers the full request / verify / resend cycle:
//! - request_otp: delivery over SMS, unregistered identifiers
//! - verify_otp: token issue, wrong-code lockout, expiry, single use
//! - resend_otp: cooldown, resend budget, code replacement

mod common;

use common::{fixtures, TestHarness};
use crm_core::domains::auth::actions::{
    request_otp, resend_otp, verify_otp, RequestOtpResult, ResendOtpResult, VerifyOtpResult,
};
use crm_core::domains::auth::JwtService;
use crm_core::kernel::test_dependencies::MockSmsService;
use crm_core::kernel::TestDependencies;
use test_context::test_context;

/// Pull the plaintext code out of a captured SMS body
fn code_from_sms(body: &str) -> String {
    body.split("code is ")
        .nth(1)
        .and_then(|rest| rest.split('.').next())
        .expect("SMS body did not contain a code")
        .to_string()
}

// =============================================================================
// Request Code Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn request_otp_sends_code_to_registered_phone(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let result = request_otp(phone.clone(), &deps).await.unwrap();

    assert!(matches!(result, RequestOtpResult::Sent));
    assert!(sms.was_sent_to(&phone));
    let body = sms.last_body().unwrap();
    assert!(body.contains("verification code"));
    assert!(body.contains("expires in 10 minutes"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn request_otp_for_unknown_identifier_sends_nothing(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let result = request_otp(fixtures::unique_phone(), &deps).await.unwrap();

    assert!(matches!(result, RequestOtpResult::NotRegistered));
    assert!(sms.sent_messages().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn request_otp_for_deactivated_user_sends_nothing(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    let user_id = fixtures::create_test_user(&ctx.db_pool, "Gone", &phone, role_id)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET active = false WHERE id = $1")
        .bind(user_id)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let result = request_otp(phone, &deps).await.unwrap();

    assert!(matches!(result, RequestOtpResult::NotRegistered));
    assert!(sms.sent_messages().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn request_otp_accepts_unnormalized_input(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    // Stored normalized; requested with formatting noise
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let formatted = format!("{} ", phone.replace("+1612", "+1 (612) "));
    let result = request_otp(formatted, &deps).await.unwrap();

    assert!(matches!(result, RequestOtpResult::Sent));
    assert!(sms.was_sent_to(&phone));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn request_otp_email_identifier_is_accepted_without_sms(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let email = fixtures::unique_email("login");
    fixtures::create_test_user(&ctx.db_pool, "Mailbox", &email, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let result = request_otp(email, &deps).await.unwrap();

    // Codes for email identifiers are not delivered over SMS
    assert!(matches!(result, RequestOtpResult::Sent));
    assert!(sms.sent_messages().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn request_otp_surfaces_sms_provider_failure(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let deps = TestDependencies::new()
        .mock_sms(MockSmsService::failing())
        .into_deps(ctx.db_pool.clone())
        .await;

    let result = request_otp(phone, &deps).await;

    assert!(result.is_err());
}

// =============================================================================
// Verify Code Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn verify_otp_with_correct_code_issues_token(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    let user_id = fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    request_otp(phone.clone(), &deps).await.unwrap();
    let code = code_from_sms(&sms.last_body().unwrap());

    let result = verify_otp(phone, code, &deps).await.unwrap();

    let VerifyOtpResult::Verified { token, user } = result else {
        panic!("expected a verified login");
    };
    assert_eq!(user.id, user_id);

    // The token must verify against the same secret and issuer the test
    // dependencies configure
    let jwt = JwtService::new("test-jwt-secret", "crm-test".to_string());
    let claims = jwt.verify_token(&token).unwrap();
    assert_eq!(claims.user_id, user_id);
    assert_eq!(claims.role_id, role_id);
    assert!(!claims.is_admin);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verify_otp_rejects_wrong_code(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    request_otp(phone.clone(), &deps).await.unwrap();

    let result = verify_otp(phone, "000000".to_string(), &deps).await.unwrap();

    assert!(matches!(result, VerifyOtpResult::InvalidCode));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verify_otp_locks_after_five_wrong_attempts(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    request_otp(phone.clone(), &deps).await.unwrap();
    let code = code_from_sms(&sms.last_body().unwrap());

    for _ in 0..4 {
        let result = verify_otp(phone.clone(), "000000".to_string(), &deps)
            .await
            .unwrap();
        assert!(matches!(result, VerifyOtpResult::InvalidCode));
    }

    // Fifth wrong attempt spends the budget
    let result = verify_otp(phone.clone(), "000000".to_string(), &deps)
        .await
        .unwrap();
    assert!(matches!(result, VerifyOtpResult::LockedOut));

    // The correct code no longer works either
    let result = verify_otp(phone, code, &deps).await.unwrap();
    assert!(matches!(result, VerifyOtpResult::LockedOut));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verify_otp_rejects_expired_code(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    request_otp(phone.clone(), &deps).await.unwrap();
    let code = code_from_sms(&sms.last_body().unwrap());

    sqlx::query("UPDATE otps SET expires_at = NOW() - INTERVAL '1 minute' WHERE identifier = $1")
        .bind(&phone)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let result = verify_otp(phone, code, &deps).await.unwrap();

    // Expired codes look exactly like codes that never existed
    assert!(matches!(result, VerifyOtpResult::InvalidCode));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn verify_otp_consumed_code_cannot_be_replayed(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    request_otp(phone.clone(), &deps).await.unwrap();
    let code = code_from_sms(&sms.last_body().unwrap());

    let first = verify_otp(phone.clone(), code.clone(), &deps).await.unwrap();
    assert!(matches!(first, VerifyOtpResult::Verified { .. }));

    let second = verify_otp(phone, code, &deps).await.unwrap();
    assert!(matches!(second, VerifyOtpResult::InvalidCode));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn requesting_again_invalidates_the_previous_code(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    request_otp(phone.clone(), &deps).await.unwrap();
    let first_code = code_from_sms(&sms.last_body().unwrap());

    request_otp(phone.clone(), &deps).await.unwrap();
    let second_code = code_from_sms(&sms.last_body().unwrap());

    let stale = verify_otp(phone.clone(), first_code, &deps).await.unwrap();
    assert!(matches!(stale, VerifyOtpResult::InvalidCode));

    let fresh = verify_otp(phone, second_code, &deps).await.unwrap();
    assert!(matches!(fresh, VerifyOtpResult::Verified { .. }));
}

// =============================================================================
// Resend Code Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn resend_otp_within_cooldown_is_refused(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    request_otp(phone.clone(), &deps).await.unwrap();

    let result = resend_otp(phone, &deps).await.unwrap();

    match result {
        ResendOtpResult::CooldownActive { retry_in_seconds } => {
            assert!(retry_in_seconds > 0 && retry_in_seconds <= 60);
        }
        _ => panic!("expected the cooldown to be active"),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn resend_otp_after_cooldown_replaces_the_code(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    request_otp(phone.clone(), &deps).await.unwrap();
    let original_code = code_from_sms(&sms.last_body().unwrap());

    sqlx::query("UPDATE otps SET last_sent_at = NOW() - INTERVAL '2 minutes' WHERE identifier = $1")
        .bind(&phone)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let result = resend_otp(phone.clone(), &deps).await.unwrap();
    assert!(matches!(result, ResendOtpResult::Sent));
    assert_eq!(sms.sent_messages().len(), 2);

    let resent_code = code_from_sms(&sms.last_body().unwrap());

    // Only the freshly delivered code verifies
    let stale = verify_otp(phone.clone(), original_code, &deps).await.unwrap();
    assert!(matches!(stale, VerifyOtpResult::InvalidCode));

    let fresh = verify_otp(phone, resent_code, &deps).await.unwrap();
    assert!(matches!(fresh, VerifyOtpResult::Verified { .. }));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn resend_otp_stops_after_the_resend_budget(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    request_otp(phone.clone(), &deps).await.unwrap();

    sqlx::query(
        "UPDATE otps SET resend_count = 5, last_sent_at = NOW() - INTERVAL '2 minutes'
         WHERE identifier = $1",
    )
    .bind(&phone)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    let result = resend_otp(phone, &deps).await.unwrap();

    assert!(matches!(result, ResendOtpResult::ResendLimitReached));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn resend_otp_without_a_live_code_issues_a_fresh_one(ctx: &TestHarness) {
    let role_id = fixtures::create_test_role(&ctx.db_pool, "sales").await.unwrap();
    let phone = fixtures::unique_phone();
    fixtures::create_test_user(&ctx.db_pool, "Ada", &phone, role_id)
        .await
        .unwrap();

    let test_deps = TestDependencies::new();
    let sms = test_deps.sms.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;

    let result = resend_otp(phone.clone(), &deps).await.unwrap();
    assert!(matches!(result, ResendOtpResult::Sent));

    let code = code_from_sms(&sms.last_body().unwrap());
    let verified = verify_otp(phone, code, &deps).await.unwrap();
    assert!(matches!(verified, VerifyOtpResult::Verified { .. }));
}
