//! Database migration command.
//!
//! Applies the storefront schema migrations and then lets the session store
//! create its own `session` table. The storefront binary never migrates on
//! startup, so this command is the only way schema changes reach a database.

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use colibri_storefront::db;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("{0}")]
    MissingEnvVar(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database URL is missing, the connection
/// fails, or a migration cannot be applied.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = super::database_url().map_err(MigrationError::MissingEnvVar)?;

    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    // The session table is owned by tower-sessions, not our migration set.
    tracing::info!("Running session store migrations");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete");
    Ok(())
}
