//! Admin flag management.

use thiserror::Error;

use colibri_storefront::db;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{0}")]
    MissingEnvVar(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The user has never signed in, so no row exists to update.
    #[error("no user with email {0} (users are created on first login)")]
    UnknownUser(String),
}

/// Set or clear the admin flag for the user with the given email.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no user row matches the email.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), AdminError> {
    let database_url = super::database_url().map_err(AdminError::MissingEnvVar)?;
    let pool = db::create_pool(&database_url).await?;

    let result = sqlx::query("UPDATE users SET is_admin = $2, updated_at = now() WHERE email = $1")
        .bind(email)
        .bind(is_admin)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AdminError::UnknownUser(email.to_string()));
    }

    if is_admin {
        tracing::info!(email, "Admin flag granted");
    } else {
        tracing::info!(email, "Admin flag revoked");
    }
    Ok(())
}
