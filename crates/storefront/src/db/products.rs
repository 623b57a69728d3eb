//! Product repository.
//!
//! Catalog reads feed the cart core; the one write that matters to checkout
//! is [`ProductRepository::decrement_stock`], which must stay a conditional
//! single-statement update. A read-then-write here would reintroduce the
//! overselling race under concurrent checkouts.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use colibri_core::{Product, ProductId};

use super::RepositoryError;
use crate::cart::Catalog;
use crate::checkout::{StockDecrement, StockLedger};

/// Fields for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: Decimal,
    pub stock: u32,
    pub images: Vec<String>,
}

/// Partial update of a product; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
}

/// Repository for catalog products.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List the whole catalog, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, category, price, stock, images, created_at, updated_at
             FROM products
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, category, price, stock, images, created_at, updated_at
             FROM products
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    /// Fetch a batch of products by ID. Missing IDs are simply absent from
    /// the result; callers treat absence as "no longer in the catalog".
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let uuids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query(
            "SELECT id, name, description, category, price, stock, images, created_at, updated_at
             FROM products
             WHERE id = ANY($1)",
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query(
            "INSERT INTO products (name, description, category, price, stock, images)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, name, description, category, price, stock, images,
                       created_at, updated_at",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.price)
        .bind(i64::from(new.stock))
        .bind(&new.images)
        .fetch_one(&self.pool)
        .await?;

        product_from_row(&row)
    }

    /// Apply a partial update to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "UPDATE products SET
                 name        = COALESCE($2, name),
                 description = CASE WHEN $3 THEN $4 ELSE description END,
                 category    = COALESCE($5, category),
                 price       = COALESCE($6, price),
                 stock       = COALESCE($7, stock),
                 images      = COALESCE($8, images),
                 updated_at  = now()
             WHERE id = $1
             RETURNING id, name, description, category, price, stock, images,
                       created_at, updated_at",
        )
        .bind(id.as_uuid())
        .bind(patch.name)
        .bind(patch.description.is_some())
        .bind(patch.description.flatten())
        .bind(patch.category)
        .bind(patch.price)
        .bind(patch.stock.map(i64::from))
        .bind(patch.images)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically take `quantity` units off a product's stock.
    ///
    /// The decrement is a single conditional statement, so two concurrent
    /// checkouts can never drive stock negative: one of them loses the race
    /// and gets [`StockDecrement::Insufficient`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products
             SET stock = stock - $2, updated_at = now()
             WHERE id = $1 AND stock >= $2",
        )
        .bind(id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(StockDecrement::Applied);
        }

        // The guard refused: report what is actually available.
        let available = sqlx::query("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match available {
            Some(row) => {
                let stock: i32 = row.try_get("stock")?;
                Ok(StockDecrement::Insufficient {
                    available: u32::try_from(stock).unwrap_or(0),
                })
            }
            None => Ok(StockDecrement::ProductMissing),
        }
    }
}

impl Catalog for ProductRepository {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.get(id).await
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        self.get_many(ids).await
    }
}

impl StockLedger for ProductRepository {
    async fn decrement(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        self.decrement_stock(id, quantity).await
    }
}

/// Decode a product row, validating stock into the unsigned domain type.
fn product_from_row(row: &PgRow) -> Result<Product, RepositoryError> {
    let stock: i32 = row.try_get("stock")?;
    let stock = u32::try_from(stock).map_err(|_| {
        RepositoryError::DataCorruption(format!("negative stock in products row: {stock}"))
    })?;

    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        price: row.try_get("price")?,
        stock,
        images: row.try_get("images")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
