//! Public catalog handlers.

use axum::{Json, extract::Path, extract::State};
use tracing::instrument;

use colibri_core::{Product, ProductId};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// List the catalog, newest first. Served from the short-lived cache.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.list_products().await?;
    Ok(Json(products.as_ref().clone()))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .products()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
