//! Integration tests for roles and permission checks.
//!
//! Covers role CRUD guards (system roles, assigned users), the
//! transactional permission sync, and capability checks through the
//! cached role-permission lookup.

mod common;

use common::{fixtures, TestHarness};
use crm_core::common::{Actor, AuthError, Permission};
use crm_core::domains::rbac::actions::{
    create_role, delete_role, sync_role_permissions, update_role,
};
use crm_core::domains::rbac::models::Role;
use crm_core::kernel::TestDependencies;
use test_context::test_context;
use uuid::Uuid;

fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

// =============================================================================
// Role CRUD Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn create_role_persists_and_rejects_duplicates(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let name = unique_name("support");

    let role = create_role(name.clone(), Some("Support staff".to_string()), &deps)
        .await
        .unwrap();
    assert_eq!(role.name, name);
    assert!(!role.is_system);

    let duplicate = create_role(name, None, &deps).await;
    assert!(duplicate
        .unwrap_err()
        .to_string()
        .contains("Role name already in use"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn create_role_rejects_blank_name(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;

    let result = create_role("   ".to_string(), None, &deps).await;

    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Role name is invalid"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn update_role_renames_a_custom_role(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("ops"), None, &deps).await.unwrap();

    let renamed = update_role(
        role.id,
        unique_name("ops-renamed"),
        Some("Renamed".to_string()),
        &deps,
    )
    .await
    .unwrap();

    assert!(renamed.name.starts_with("ops-renamed"));
    assert_eq!(renamed.description.as_deref(), Some("Renamed"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn system_role_cannot_be_renamed_or_deleted(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let admin = Role::find_by_name("admin", &ctx.db_pool)
        .await
        .unwrap()
        .expect("admin role is seeded by migrations");
    assert!(admin.is_system);

    let rename = update_role(admin.id, unique_name("not-admin"), None, &deps).await;
    assert!(rename
        .unwrap_err()
        .to_string()
        .contains("System roles cannot be renamed"));

    let delete = delete_role(admin.id, &deps).await;
    assert!(delete
        .unwrap_err()
        .to_string()
        .contains("System roles cannot be deleted"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn role_with_assigned_users_cannot_be_deleted(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("staffed"), None, &deps).await.unwrap();
    fixtures::create_test_user(
        &ctx.db_pool,
        "Member",
        &fixtures::unique_email("member"),
        role.id,
    )
    .await
    .unwrap();

    let result = delete_role(role.id, &deps).await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("assigned users and cannot be deleted"));

    // An unstaffed role deletes cleanly
    let empty = create_role(unique_name("empty"), None, &deps).await.unwrap();
    delete_role(empty.id, &deps).await.unwrap();
    assert!(Role::find_by_id(empty.id, &ctx.db_pool)
        .await
        .unwrap()
        .is_none());
}

// =============================================================================
// Permission Sync Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn sync_role_permissions_grants_capabilities(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("sales"), None, &deps).await.unwrap();
    let user_id = crm_core::common::UserId::new();

    let keys = sync_role_permissions(
        role.id,
        vec!["leads.view".to_string(), "leads.manage".to_string()],
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(keys, vec!["leads.manage", "leads.view"]);

    Actor::new(user_id, role.id, false)
        .can(Permission::LeadsManage)
        .check(deps.as_ref())
        .await
        .unwrap();

    let denied = Actor::new(user_id, role.id, false)
        .can(Permission::WorkflowsManage)
        .check(deps.as_ref())
        .await;
    assert!(matches!(denied, Err(AuthError::PermissionDenied(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn sync_role_permissions_replaces_the_whole_set(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("rotating"), None, &deps).await.unwrap();
    let user_id = crm_core::common::UserId::new();

    sync_role_permissions(role.id, vec!["leads.view".to_string()], &deps)
        .await
        .unwrap();
    Actor::new(user_id, role.id, false)
        .can(Permission::LeadsView)
        .check(deps.as_ref())
        .await
        .unwrap();

    // Replace, not merge: the old grant must disappear and the cached key
    // set must be dropped with it
    sync_role_permissions(role.id, vec!["workflows.view".to_string()], &deps)
        .await
        .unwrap();

    let revoked = Actor::new(user_id, role.id, false)
        .can(Permission::LeadsView)
        .check(deps.as_ref())
        .await;
    assert!(matches!(revoked, Err(AuthError::PermissionDenied(_))));

    Actor::new(user_id, role.id, false)
        .can(Permission::WorkflowsView)
        .check(deps.as_ref())
        .await
        .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn sync_role_permissions_rejects_unknown_keys_untouched(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("careful"), None, &deps).await.unwrap();
    let user_id = crm_core::common::UserId::new();

    sync_role_permissions(role.id, vec!["leads.view".to_string()], &deps)
        .await
        .unwrap();

    let result = sync_role_permissions(
        role.id,
        vec!["leads.view".to_string(), "no.such_permission".to_string()],
        &deps,
    )
    .await;
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Unknown permission key"));

    // The rejected sync must not have altered the existing grants
    Actor::new(user_id, role.id, false)
        .can(Permission::LeadsView)
        .check(deps.as_ref())
        .await
        .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn sync_role_permissions_can_revoke_everything(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("stripped"), None, &deps).await.unwrap();

    sync_role_permissions(role.id, vec!["leads.view".to_string()], &deps)
        .await
        .unwrap();
    let keys = sync_role_permissions(role.id, Vec::new(), &deps).await.unwrap();

    assert!(keys.is_empty());
}

// =============================================================================
// Capability Check Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn admin_flag_bypasses_role_grants(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role = create_role(unique_name("bare"), None, &deps).await.unwrap();

    // No grants at all, but the admin flag short-circuits the lookup
    Actor::new(crm_core::common::UserId::new(), role.id, true)
        .can(Permission::RolesManage)
        .check(deps.as_ref())
        .await
        .unwrap();
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_role_is_denied(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;

    let result = Actor::new(
        crm_core::common::UserId::new(),
        crm_core::common::RoleId::new(),
        false,
    )
    .can(Permission::LeadsView)
    .check(deps.as_ref())
    .await;

    assert!(matches!(result, Err(AuthError::PermissionDenied(_))));
}
