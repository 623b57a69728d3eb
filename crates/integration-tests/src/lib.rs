//! Integration tests for Colibri.
//!
//! These tests run against a live storefront, so they are all `#[ignore]`d
//! by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! docker compose up -d db
//! cargo run -p colibri-cli -- migrate
//! cargo run -p colibri-cli -- seed products
//!
//! # Start the storefront, then run the ignored tests
//! cargo run -p colibri-storefront &
//! cargo test -p colibri-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `storefront_catalog` - Catalog browsing
//! - `storefront_cart` - Guest cart session flow
//! - `storefront_checkout` - Checkout request validation

use reqwest::Client;

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// HTTP client that keeps its session cookie, like a browser would.
///
/// # Panics
///
/// Panics if the client cannot be constructed.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Connect to the storefront database for direct state assertions.
///
/// # Panics
///
/// Panics if `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) is unset or the
/// connection fails.
pub async fn storefront_pool() -> sqlx::PgPool {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("STOREFRONT_DATABASE_URL (or DATABASE_URL) must be set");
    sqlx::PgPool::connect(&url)
        .await
        .expect("Failed to connect to storefront database")
}
