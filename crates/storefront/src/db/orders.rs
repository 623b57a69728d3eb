//! Order repository.
//!
//! Orders are append-mostly: insertion is idempotent per payment reference
//! (backed by the UNIQUE constraint) and the only mutation is the status
//! column, guarded by the forward-only transition rules.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use colibri_core::{
    GuestInfo, Order, OrderDraft, OrderId, OrderLineItem, OrderStatus, ShippingAddress, UserId,
};

use super::RepositoryError;
use crate::checkout::OrderStore;

const ORDER_COLUMNS: &str = "id, user_id, guest_info, items, shipping_address, total_price, \
                             payment_reference, status, created_at";

/// Repository for placed orders.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order, idempotently per payment reference.
    ///
    /// A duplicate reference returns the order that won the race instead of
    /// inserting a second one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        let sql = format!(
            "INSERT INTO orders \
                 (user_id, guest_info, items, shipping_address, total_price, \
                  payment_reference, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (payment_reference) DO NOTHING \
             RETURNING {ORDER_COLUMNS}"
        );
        let inserted = sqlx::query(&sql)
            .bind(draft.user_id.as_ref().map(UserId::as_str))
            .bind(draft.guest_info.as_ref().map(Json))
            .bind(Json(&draft.items))
            .bind(Json(&draft.shipping_address))
            .bind(draft.total_price)
            .bind(&draft.payment_reference)
            .bind(draft.status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = inserted {
            return order_from_row(&row);
        }

        // Lost the insert race; the reference already has its order.
        self.get_by_payment_reference(&draft.payment_reference)
            .await?
            .ok_or_else(|| {
                RepositoryError::Conflict(format!(
                    "order for payment reference {} exists but could not be read",
                    draft.payment_reference
                ))
            })
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    /// Get an order by its payment reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1");
        let row = sqlx::query(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(order_from_row).collect()
    }

    /// List every order, newest first. Admin surface only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    /// Move an order to a new status, enforcing the transition rules.
    ///
    /// The update is guarded on the status read beforehand, so a concurrent
    /// change surfaces as a conflict instead of silently winning.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` for an illegal or raced transition.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query("SELECT status FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let current_raw: String = row.try_get("status")?;
        let current = OrderStatus::parse(&current_raw).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("unknown order status: {current_raw}"))
        })?;

        if !current.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "order cannot move from {current} to {next}"
            )));
        }

        let sql = format!(
            "UPDATE orders SET status = $2 WHERE id = $1 AND status = $3 RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(next.as_str())
            .bind(current.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                RepositoryError::Conflict(format!(
                    "order status changed concurrently (was {current})"
                ))
            })?;

        order_from_row(&updated)
    }
}

impl OrderStore for OrderRepository {
    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        self.get_by_payment_reference(reference).await
    }

    async fn create(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
        self.insert(draft).await
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, RepositoryError> {
    let id: Uuid = row.try_get("id")?;
    let user_id: Option<String> = row.try_get("user_id")?;
    let guest_info: Option<Json<GuestInfo>> = row
        .try_get("guest_info")
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid guest info: {e}")))?;
    let Json(items): Json<Vec<OrderLineItem>> = row
        .try_get("items")
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid order items: {e}")))?;
    let Json(shipping_address): Json<ShippingAddress> = row
        .try_get("shipping_address")
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid shipping address: {e}")))?;
    let total_price: Decimal = row.try_get("total_price")?;
    let status_raw: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::DataCorruption(format!("unknown order status: {status_raw}"))
    })?;

    Ok(Order {
        id: OrderId::from(id),
        user_id: user_id.map(UserId::new),
        guest_info: guest_info.map(|Json(g)| g),
        items,
        shipping_address,
        total_price,
        payment_reference: row.try_get("payment_reference")?,
        status,
        created_at: row.try_get("created_at")?,
    })
}
