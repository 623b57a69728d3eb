//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness check
//! GET    /health/ready                  - Readiness check (database ping)
//!
//! # Products
//! GET    /api/products                  - Catalog listing (cached)
//! GET    /api/products/{id}             - Product detail
//!
//! # Cart (guest or logged-in)
//! GET    /api/cart                      - Current cart
//! DELETE /api/cart                      - Empty the cart
//! POST   /api/cart/items                - Add one unit of a product
//! PUT    /api/cart/items/{id}           - Set a line's quantity
//! DELETE /api/cart/items/{id}           - Remove a line
//!
//! # Auth
//! POST   /api/auth/session              - Login (verify ID token, reconcile carts)
//! DELETE /api/auth/session              - Logout (discard guest cart)
//! GET    /api/auth/me                   - Current logged-in identity
//!
//! # Checkout
//! POST   /api/checkout/payment-intent   - Authorize payment for the cart
//! POST   /api/checkout/complete         - Confirm payment and place the order
//!
//! # Orders (requires auth)
//! GET    /api/orders                    - Current user's orders
//! GET    /api/orders/{id}               - Order detail (owner or admin)
//!
//! # Admin (requires admin)
//! GET    /api/admin/products            - Catalog listing (uncached)
//! POST   /api/admin/products            - Create a product
//! PUT    /api/admin/products/{id}       - Update a product
//! DELETE /api/admin/products/{id}       - Delete a product
//! GET    /api/admin/orders              - All orders
//! PUT    /api/admin/orders/{id}/status  - Advance an order's status
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};

use crate::db::RepositoryError;
use crate::error::Result;
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route("/items/{id}", put(cart::update_item).delete(cart::remove_item))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(auth::login).delete(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-intent", post(checkout::create_payment_intent))
        .route("/complete", post(checkout::complete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/status", put(admin::update_order_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/auth", auth_routes())
        .nest("/api/checkout", checkout_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/admin", admin_routes())
}

async fn health() -> &'static str {
    "OK"
}

async fn ready(State(state): State<AppState>) -> Result<&'static str> {
    sqlx::query("SELECT 1")
        .execute(state.pool())
        .await
        .map_err(RepositoryError::from)
        .map_err(crate::error::AppError::from)?;
    Ok("OK")
}
