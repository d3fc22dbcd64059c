use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::server::app::AppState;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthReport {
    status: &'static str,
    database: CheckOutcome,
    pool: PoolStats,
    registered_schedules: usize,
}

#[derive(Serialize)]
struct CheckOutcome {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct PoolStats {
    open: u32,
    idle: usize,
    max: u32,
}

/// Liveness probe: 200 while the database answers, 503 otherwise.
///
/// Pool occupancy and the number of live workflow schedules ride along
/// for dashboards.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthReport>) {
    let pool = &state.deps.db_pool;

    let database = probe_database(pool).await;
    let code = if database.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let report = HealthReport {
        status: if database.ok { "ok" } else { "degraded" },
        database,
        pool: PoolStats {
            open: pool.size(),
            idle: pool.num_idle(),
            max: pool.options().get_max_connections(),
        },
        registered_schedules: state.deps.schedule_registry.registered_count().await,
    };

    (code, Json(report))
}

async fn probe_database(pool: &PgPool) -> CheckOutcome {
    let probe = sqlx::query("SELECT 1").execute(pool);
    match tokio::time::timeout(DB_PROBE_TIMEOUT, probe).await {
        Ok(Ok(_)) => CheckOutcome {
            ok: true,
            detail: None,
        },
        Ok(Err(e)) => CheckOutcome {
            ok: false,
            detail: Some(e.to_string()),
        },
        Err(_) => CheckOutcome {
            ok: false,
            detail: Some("probe timed out".to_string()),
        },
    }
}
