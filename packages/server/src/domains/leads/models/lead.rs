use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::common::pagination::{PaginationDirection, ValidatedPaginationArgs};
use crate::common::{LeadId, UserId};

/// Lead status lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
    Lost,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Unqualified => "unqualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        };
        write!(f, "{}", s)
    }
}

/// Where a lead came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "lead_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Manual,
    FacebookAds,
    WebForm,
    Api,
    Import,
}

impl std::fmt::Display for LeadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeadSource::Manual => "manual",
            LeadSource::FacebookAds => "facebook_ads",
            LeadSource::WebForm => "web_form",
            LeadSource::Api => "api",
            LeadSource::Import => "import",
        };
        write!(f, "{}", s)
    }
}

/// A sales prospect. `fields` holds free-form custom fields (and, for
/// imported leads, the raw field answers). `external_ref` carries the source
/// system's id (e.g. a Facebook leadgen id) and backs import idempotency.
///
/// Every write happens inside a caller-held transaction so the matching
/// activity row commits atomically with the lead mutation.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: LeadStatus,
    pub source: LeadSource,
    pub owner_id: Option<UserId>,
    pub external_ref: Option<String>,
    pub fields: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for listing leads
/// Deserializes straight from the query string of `GET /leads`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub owner_id: Option<UserId>,
    /// Case-insensitive substring match over name, email, and company.
    pub search: Option<String>,
}

impl Lead {
    pub fn new(name: String, source: LeadSource) -> Self {
        let now = Utc::now();
        Lead {
            id: LeadId::new(),
            name,
            email: None,
            phone: None,
            company: None,
            status: LeadStatus::New,
            source,
            owner_id: None,
            external_ref: None,
            fields: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    /// Find lead by ID
    pub async fn find_by_id(id: LeadId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Find lead by source system reference (import idempotency check)
    pub async fn find_by_external_ref(external_ref: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM leads WHERE external_ref = $1")
            .bind(external_ref)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert new lead
    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO leads (
                id,
                name,
                email,
                phone,
                company,
                status,
                source,
                owner_id,
                external_ref,
                fields,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *",
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.email)
        .bind(&self.phone)
        .bind(&self.company)
        .bind(self.status)
        .bind(self.source)
        .bind(self.owner_id)
        .bind(&self.external_ref)
        .bind(&self.fields)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Update contact fields and custom fields
    #[allow(clippy::too_many_arguments)]
    pub async fn update_fields(
        id: LeadId,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        company: Option<&str>,
        fields: &serde_json::Value,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE leads
             SET name = $2,
                 email = $3,
                 phone = $4,
                 company = $5,
                 fields = $6,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(company)
        .bind(fields)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Move a lead to a new status
    pub async fn set_status(
        id: LeadId,
        status: LeadStatus,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Set or clear the owning user
    pub async fn set_owner(
        id: LeadId,
        owner_id: Option<UserId>,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE leads SET owner_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Into::into)
    }

    /// Delete a lead. Activities cascade via FK.
    pub async fn delete(id: LeadId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find leads with cursor pagination and optional filters
    pub async fn find_paginated(
        filter: &LeadFilter,
        args: &ValidatedPaginationArgs,
        pool: &PgPool,
    ) -> Result<(Vec<Self>, bool)> {
        let fetch_limit = args.fetch_limit();

        let results = match args.direction {
            PaginationDirection::Forward => {
                sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM leads
                    WHERE ($1::lead_status IS NULL OR status = $1)
                      AND ($2::lead_source IS NULL OR source = $2)
                      AND ($3::uuid IS NULL OR owner_id = $3)
                      AND ($4::text IS NULL
                           OR name ILIKE '%' || $4 || '%'
                           OR email ILIKE '%' || $4 || '%'
                           OR company ILIKE '%' || $4 || '%')
                      AND ($5::uuid IS NULL OR id > $5)
                    ORDER BY id ASC
                    LIMIT $6
                    "#,
                )
                .bind(filter.status)
                .bind(filter.source)
                .bind(filter.owner_id)
                .bind(&filter.search)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?
            }
            PaginationDirection::Backward => {
                let mut rows = sqlx::query_as::<_, Self>(
                    r#"
                    SELECT * FROM leads
                    WHERE ($1::lead_status IS NULL OR status = $1)
                      AND ($2::lead_source IS NULL OR source = $2)
                      AND ($3::uuid IS NULL OR owner_id = $3)
                      AND ($4::text IS NULL
                           OR name ILIKE '%' || $4 || '%'
                           OR email ILIKE '%' || $4 || '%'
                           OR company ILIKE '%' || $4 || '%')
                      AND ($5::uuid IS NULL OR id < $5)
                    ORDER BY id DESC
                    LIMIT $6
                    "#,
                )
                .bind(filter.status)
                .bind(filter.source)
                .bind(filter.owner_id)
                .bind(&filter.search)
                .bind(args.cursor)
                .bind(fetch_limit)
                .fetch_all(pool)
                .await?;

                rows.reverse();
                rows
            }
        };

        let has_more = results.len() > args.limit as usize;
        let results = if has_more {
            results.into_iter().take(args.limit as usize).collect()
        } else {
            results
        };

        Ok((results, has_more))
    }
}
