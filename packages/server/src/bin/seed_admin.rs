//! Seeds the first admin user.
//!
//! Sign-in is restricted to registered identifiers and user creation needs a
//! signed-in admin, so a fresh install has no way to mint its first account
//! through the API. This binary inserts one directly.
//!
//! Usage: seed_admin --name "Ada Lovelace" --identifier ada@example.com

use anyhow::{bail, Context, Result};
use clap::Parser;
use crm_core::common::Identifier;
use crm_core::domains::rbac::Role;
use crm_core::domains::users::User;
use sqlx::postgres::PgPoolOptions;

#[derive(Parser)]
#[command(name = "seed_admin")]
#[command(about = "Create the first admin user")]
struct Cli {
    /// Display name for the account
    #[arg(long)]
    name: String,

    /// Phone number or email address the admin signs in with
    #[arg(long)]
    identifier: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let identifier = match Identifier::normalize(&cli.identifier) {
        Ok(identifier) => identifier,
        Err(reason) => bail!("{}", reason),
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    if let Some(existing) = User::find_by_identifier(&identifier.value, &pool).await? {
        println!(
            "✓ User already exists: {} ({})",
            existing.name, existing.identifier
        );
        return Ok(());
    }

    let admin_role = Role::find_by_name("admin", &pool)
        .await?
        .context("Admin role not found; run migrations first")?;

    let user = User::new(cli.name, identifier.value, admin_role.id, true)
        .insert(&pool)
        .await?;

    println!("✓ Created admin user: {} ({})", user.name, user.identifier);
    Ok(())
}
