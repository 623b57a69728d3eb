//! Server-side cart repository.
//!
//! One JSONB row per authenticated user. Guests never touch this table;
//! their carts live in the session record until login reconciles them in.

use sqlx::types::Json;
use sqlx::{PgPool, Row};

use colibri_core::{CartLineItem, UserId};

use super::RepositoryError;
use crate::cart::session::CartError;
use crate::cart::UserCartStore;

/// Repository for per-user server carts.
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a user's cart. A user without a cart row has an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails and
    /// `RepositoryError::DataCorruption` if the stored JSON does not decode.
    pub async fn get(&self, user: &UserId) -> Result<Vec<CartLineItem>, RepositoryError> {
        let row = sqlx::query("SELECT items FROM carts WHERE user_id = $1")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(items): Json<Vec<CartLineItem>> =
                    row.try_get("items").map_err(|e| {
                        RepositoryError::DataCorruption(format!("invalid cart items: {e}"))
                    })?;
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Replace a user's cart wholesale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails (including a
    /// missing user row).
    pub async fn put(
        &self,
        user: &UserId,
        items: &[CartLineItem],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO carts (user_id, items, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (user_id) DO UPDATE
             SET items = EXCLUDED.items, updated_at = NOW()",
        )
        .bind(user.as_str())
        .bind(Json(items))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop a user's cart row. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&self, user: &UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl UserCartStore for CartRepository {
    async fn load(&self, user: &UserId) -> Result<Vec<CartLineItem>, CartError> {
        Ok(self.get(user).await?)
    }

    async fn save(&self, user: &UserId, items: &[CartLineItem]) -> Result<(), CartError> {
        Ok(self.put(user, items).await?)
    }

    async fn delete(&self, user: &UserId) -> Result<(), CartError> {
        Ok(self.remove(user).await?)
    }
}
