//! Durable storage layer for the Fieldline platform core: diesel schema,
//! row models, and async query functions over Postgres.

pub mod db;
pub mod error;
pub mod model;

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// ## Summary
/// Applies any pending embedded migrations over a blocking connection.
/// Intended for startup and test harnesses, not request paths.
///
/// ## Errors
/// Returns an error if the connection cannot be established or a migration
/// fails to apply.
pub fn run_pending_migrations(database_url: &str) -> anyhow::Result<()> {
    use diesel::Connection;
    use diesel_migrations::MigrationHarness;

    let mut conn = diesel::PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("migration failed: {e}"))?;

    Ok(())
}
