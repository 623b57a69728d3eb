//! Admin catalog and order management handlers.
//!
//! All handlers require the admin flag, granted out-of-band via the CLI.
//! Catalog mutations invalidate the public listing cache so storefront
//! visitors see the change within one request.

use axum::{Json, extract::Path, extract::State, http::StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::instrument;

use colibri_core::{Order, OrderId, OrderStatus, Product, ProductId};

use crate::db::products::{NewProduct, ProductPatch};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

fn default_category() -> String {
    "general".to_owned()
}

/// Distinguishes an absent field (leave unchanged) from an explicit `null`
/// (clear the value).
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    pub price: Decimal,
    pub stock: u32,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Full catalog, bypassing the public cache.
#[instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.products().list().await?))
}

/// Create a product.
#[instrument(skip_all, fields(name = %request.name))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    if request.price < Decimal::ZERO {
        return Err(AppError::BadRequest("price must not be negative".to_owned()));
    }

    let product = state
        .products()
        .create(NewProduct {
            name: request.name,
            description: request.description,
            category: request.category,
            price: request.price,
            stock: request.stock,
            images: request.images,
        })
        .await?;
    state.invalidate_catalog().await;

    tracing::info!(admin = %admin.id, product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product.
#[instrument(skip(state, request), fields(product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>> {
    if matches!(request.price, Some(p) if p < Decimal::ZERO) {
        return Err(AppError::BadRequest("price must not be negative".to_owned()));
    }

    let product = state
        .products()
        .update(
            id,
            ProductPatch {
                name: request.name,
                description: request.description,
                category: request.category,
                price: request.price,
                stock: request.stock,
                images: request.images,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    state.invalidate_catalog().await;

    Ok(Json(product))
}

/// Delete a product. Existing carts and orders keep their line snapshots.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let deleted = state.products().delete(id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    state.invalidate_catalog().await;

    tracing::info!(admin = %admin.id, product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Every order in the store, newest first.
#[instrument(skip_all)]
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_all().await?))
}

/// Advance an order's status along the forward-only lifecycle.
#[instrument(skip(state, request), fields(order_id = %id))]
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = state.orders().update_status(id, request.status).await?;
    tracing::info!(admin = %admin.id, order_id = %id, status = %order.status, "order status updated");
    Ok(Json(order))
}
