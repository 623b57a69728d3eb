//! User repository.
//!
//! Users are a mirror of identity-provider accounts: the provider owns
//! authentication, this table owns what the store knows about the person
//! (currently just the email and the admin flag). Rows are upserted on every
//! verified login so the mirror tracks email changes at the provider.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use colibri_core::{Email, UserId};

use super::RepositoryError;
use crate::models::user::User;

/// Repository for identity-mirror users.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a user from a verified login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(&self, subject: &UserId, email: &Email) -> Result<User, RepositoryError> {
        let row = sqlx::query(
            "INSERT INTO users (subject, email)
             VALUES ($1, $2)
             ON CONFLICT (subject) DO UPDATE
             SET email = EXCLUDED.email, updated_at = NOW()
             RETURNING subject, email, is_admin, created_at, updated_at",
        )
        .bind(subject.as_str())
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }

    /// Get a user by subject.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, subject: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT subject, email, is_admin, created_at, updated_at
             FROM users
             WHERE subject = $1",
        )
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &PgRow) -> Result<User, RepositoryError> {
    let email_raw: String = row.try_get("email")?;
    let email = Email::parse(&email_raw).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
    })?;

    Ok(User {
        id: UserId::new(row.try_get::<String, _>("subject")?),
        email,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
