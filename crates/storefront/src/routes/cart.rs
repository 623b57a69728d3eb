//! Cart route handlers.
//!
//! The same endpoints serve guests and logged-in users: the active store is
//! picked from the session's authentication state, so the client never needs
//! to know where its cart lives.

use axum::{Json, extract::Path, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use colibri_core::{CartLineItem, ProductId};

use crate::cart::session::SessionGuestCart;
use crate::cart::{CartSession, CartStore};
use crate::db::{CartRepository, ProductRepository};
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::state::AppState;

/// The cart session wired to the app's real stores.
pub type AppCartSession = CartSession<ProductRepository, SessionGuestCart, CartRepository>;

/// Build the cart facade for this request's visitor.
pub fn cart_session(
    state: &AppState,
    session: Session,
    user: Option<&CurrentUser>,
) -> AppCartSession {
    CartSession::new(
        state.products().clone(),
        SessionGuestCart::new(session),
        state.carts().clone(),
        user.map(|u| u.id.clone()),
    )
}

/// Cart representation returned by every cart endpoint.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineItem>,
    pub total: Decimal,
    pub unit_count: u32,
}

impl From<CartStore> for CartResponse {
    fn from(cart: CartStore) -> Self {
        Self {
            total: cart.total(),
            unit_count: cart.unit_count(),
            items: cart.into_items(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Current cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartResponse>> {
    let cart = cart_session(&state, session, user.as_ref()).load().await?;
    Ok(Json(cart.into()))
}

/// Add one unit of a product.
#[instrument(skip(state, session, user), fields(product_id = %request.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartResponse>> {
    let cart = cart_session(&state, session, user.as_ref())
        .add_item(request.product_id)
        .await?;
    Ok(Json(cart.into()))
}

/// Set a line's quantity. Zero or negative removes the line; anything above
/// stock is clamped.
#[instrument(skip(state, session, user), fields(product_id = %id))]
pub async fn update_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>> {
    let cart = cart_session(&state, session, user.as_ref())
        .update_quantity(id, request.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// Remove a line.
#[instrument(skip(state, session, user), fields(product_id = %id))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<CartResponse>> {
    let cart = cart_session(&state, session, user.as_ref())
        .remove_item(id)
        .await?;
    Ok(Json(cart.into()))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartResponse>> {
    let cart = cart_session(&state, session, user.as_ref()).clear().await?;
    Ok(Json(cart.into()))
}
