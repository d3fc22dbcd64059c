//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::get,
    Router,
};
use sqlx::PgPool;
use tokio_cron_scheduler::JobScheduler;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use twilio::{TwilioOptions, TwilioService};

use crate::config::Config;
use crate::domains::auth::JwtService;
use crate::domains::integrations::effects::register_integration_jobs;
use crate::domains::workflows::effects::register_workflow_jobs;
use crate::kernel::jobs::{JobQueue, JobRegistry, JobRunner, PostgresJobQueue};
use crate::kernel::traits::{BaseCalendarClient, BaseFacebookClient};
use crate::kernel::{
    CacheService, FacebookClient, GoogleClient, NoopCalendarClient, NoopFacebookClient,
    ScheduleRegistry, ServerDeps, TwilioAdapter,
};
use crate::server::middleware::{extract_client_ip, jwt_auth_middleware};
use crate::server::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router.
///
/// Also constructs the dependency graph and spawns the job runner. Returns
/// the deps and the (not yet started) cron scheduler alongside the router;
/// main starts the scheduler and registers workflow schedules once the
/// router exists, so a boot failure never leaves cron jobs firing against
/// a half-built app.
pub async fn build_app(
    config: &Config,
    pool: PgPool,
) -> Result<(Router, Arc<ServerDeps>, JobScheduler)> {
    // Twilio is the OTP and notification SMS transport
    let twilio = Arc::new(TwilioService::new(TwilioOptions {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        from_number: config.twilio_from_number.clone(),
    }));

    // Integration clients fall back to no-ops when unconfigured, so a dev
    // setup without Facebook/Google credentials still boots.
    let facebook: Arc<dyn BaseFacebookClient> = if config.facebook_app_id.is_empty() {
        Arc::new(NoopFacebookClient)
    } else {
        Arc::new(FacebookClient::new(
            config.facebook_app_id.clone(),
            config.facebook_app_secret.clone(),
        )?)
    };

    let calendar: Arc<dyn BaseCalendarClient> = if config.google_client_id.is_empty() {
        Arc::new(NoopCalendarClient)
    } else {
        Arc::new(GoogleClient::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
        )?)
    };

    let job_queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(pool.clone()));
    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()));

    // The scheduler is created here (ScheduleRegistry is part of deps) but
    // only started by main, after migrations and schedule re-registration.
    let scheduler = JobScheduler::new()
        .await
        .context("creating the cron scheduler")?;
    let schedule_registry = ScheduleRegistry::new(scheduler.clone(), job_queue.clone());

    let server_deps = Arc::new(ServerDeps::new(
        pool.clone(),
        CacheService::new(),
        job_queue.clone(),
        Arc::new(TwilioAdapter::new(twilio)),
        facebook,
        calendar,
        jwt_service.clone(),
        schedule_registry,
        config.public_base_url.clone(),
        config.facebook_app_id.clone(),
        config.facebook_app_secret.clone(),
        config.facebook_webhook_verify_token.clone(),
        config.google_client_id.clone(),
    ));

    // Job registry: every background command the runner can execute
    let mut job_registry = JobRegistry::new();
    register_workflow_jobs(&mut job_registry);
    register_integration_jobs(&mut job_registry);
    tracing::info!(job_types = ?job_registry.registered_types(), "job registry initialized");
    let job_registry = Arc::new(job_registry);

    // The job runner polls the queue as a background task for the lifetime
    // of the process
    let runner = JobRunner::new(job_queue, job_registry, server_deps.clone());
    tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!(error = %e, "job runner exited");
        }
    });

    let app_state = AppState {
        deps: server_deps.clone(),
    };

    // Any origin: the dashboard is served from a separate host in every
    // environment and the API carries its own bearer auth.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let jwt_service_for_middleware = jwt_service.clone();

    // Rate limiting for the anonymous OTP endpoints: 10/sec with burst of
    // 20 per IP. The rest of the API sits behind JWT auth and stays
    // unlimited.
    let rate_limit_config = std::sync::Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .use_headers()
            .finish()
            .context("building the rate limiter config")?,
    );

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config,
    };

    let app = Router::new()
        // OTP login endpoints, rate limited per client IP
        .merge(routes::auth::routes().layer(rate_limit_layer))
        .merge(routes::users::routes())
        .merge(routes::roles::routes())
        .merge(routes::leads::routes())
        .merge(routes::workflows::routes())
        .merge(routes::integrations::routes())
        .merge(routes::calendar::routes())
        .merge(routes::notifications::routes())
        .route("/health", get(routes::health_handler))
        // Request flow is outside-in: trace, CORS, state, client IP, auth.
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service_for_middleware.clone(), req, next)
        }))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok((app, server_deps, scheduler))
}
