//! Schema migration CLI.
//!
//! Applies the SQL migrations embedded from `./migrations` against
//! `DATABASE_URL`. The server also runs pending migrations on boot; this
//! binary exists for applying them ahead of a deploy or from CI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Parser)]
#[command(name = "migrate_cli")]
#[command(about = "Run schema migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Run,

    /// List migrations and whether each has been applied
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => cmd_run().await,
        Commands::Status => cmd_status().await,
    }
}

async fn get_pool() -> Result<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")
}

async fn cmd_run() -> Result<()> {
    let pool = get_pool().await?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    println!("Migrations are up to date");
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let pool = get_pool().await?;

    // The bookkeeping table does not exist until the first run.
    let applied: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations ORDER BY version")
            .fetch_all(&pool)
            .await
            .unwrap_or_default();

    for migration in MIGRATOR.iter() {
        let state = if applied.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        println!(
            "{:>14}  {:<8} {}",
            migration.version, state, migration.description
        );
    }

    Ok(())
}
