//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly. Tests share one database,
//! so anything with a uniqueness constraint (identifiers, role names) is
//! suffixed with a fresh UUID.

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crm_core::common::{LeadId, RoleId, UserId};
use crm_core::domains::leads::models::{Lead, LeadSource};
use crm_core::domains::rbac::models::Role;
use crm_core::domains::users::models::User;

/// A unique email identifier for this test run
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

/// A unique E.164 phone identifier for this test run
pub fn unique_phone() -> String {
    let digits = Uuid::new_v4().as_u128() % 10_000_000;
    format!("+1612{:07}", digits)
}

/// Create a role with no permissions granted
pub async fn create_test_role(pool: &PgPool, name_prefix: &str) -> Result<RoleId> {
    let role = Role::new(
        format!("{}-{}", name_prefix, Uuid::new_v4().simple()),
        Some("test role".to_string()),
    )
    .insert(pool)
    .await?;
    Ok(role.id)
}

/// Create an active non-admin user on the given role
pub async fn create_test_user(
    pool: &PgPool,
    name: &str,
    identifier: &str,
    role_id: RoleId,
) -> Result<UserId> {
    let user = User::new(name.to_string(), identifier.to_string(), role_id, false)
        .insert(pool)
        .await?;
    Ok(user.id)
}

/// Create a manual lead with no owner
pub async fn create_test_lead(pool: &PgPool, name: &str) -> Result<LeadId> {
    let mut tx = pool.begin().await?;
    let lead = Lead::new(name.to_string(), LeadSource::Manual)
        .insert(&mut tx)
        .await?;
    tx.commit().await?;
    Ok(lead.id)
}
