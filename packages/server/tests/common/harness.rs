//! Shared Postgres container for integration tests.
//!
//! The container starts once per `cargo test` run; migrations run once
//! against it, and every test draws its own pool on the same database.
//! Tests keep their rows apart with unique identifiers rather than
//! per-test databases.

use anyhow::{Context, Result};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

static PG: OnceCell<SharedPostgres> = OnceCell::const_new();

struct SharedPostgres {
    url: String,
    // Dropping the container kills the database; hold it for the whole run.
    // `None` when an external database was supplied via TEST_DATABASE_URL.
    _container: Option<ContainerAsync<Postgres>>,
}

impl SharedPostgres {
    async fn get() -> &'static Self {
        PG.get_or_init(|| async {
            Self::start().await.expect("test Postgres failed to start")
        })
        .await
    }

    async fn start() -> Result<Self> {
        // Honor RUST_LOG when tests run with --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        // TEST_DATABASE_URL points at an already-running Postgres (for
        // environments without Docker); otherwise start a container.
        let (url, container) = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => (url, None),
            Err(_) => {
                let container = Postgres::default()
                    .with_tag("16")
                    .with_cmd(["-c", "max_connections=200"])
                    .start()
                    .await
                    .context("starting the Postgres container")?;

                let url = format!(
                    "postgresql://postgres:postgres@{}:{}/postgres",
                    container.get_host().await?,
                    container.get_host_port_ipv4(5432).await?
                );
                (url, Some(container))
            }
        };

        let pool = PgPool::connect(&url)
            .await
            .context("connecting for migrations")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("migrating the test database")?;

        Ok(Self {
            url,
            _container: container,
        })
    }
}

/// One pool per test against the shared database.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
/// }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        let pg = SharedPostgres::get().await;
        let db_pool = PgPool::connect(&pg.url)
            .await
            .expect("connecting to the test database");

        Self { db_pool }
    }

    async fn teardown(self) {}
}
