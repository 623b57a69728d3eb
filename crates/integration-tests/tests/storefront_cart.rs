//! Integration tests for the guest cart session flow.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The storefront server running (cargo run -p colibri-storefront)
//! - A seeded catalog with at least one in-stock product
//!
//! Run with: cargo test -p colibri-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use colibri_integration_tests::{session_client, storefront_base_url};

/// Pick an in-stock product from the live catalog.
async fn any_in_stock_product(client: &Client) -> Option<Value> {
    let base_url = storefront_base_url();
    let listing: Vec<Value> = client
        .get(format!("{base_url}/api/products"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to parse product list");

    listing
        .into_iter()
        .find(|p| p.get("stock").and_then(Value::as_u64).unwrap_or(0) > 0)
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_empty_cart_for_new_session() {
    let client = session_client();
    let base_url = storefront_base_url();

    let cart: Value = client
        .get(format!("{base_url}/api/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");

    assert_eq!(cart.get("unit_count").and_then(Value::as_u64), Some(0));
    assert_eq!(
        cart.get("items").and_then(Value::as_array).map(Vec::len),
        Some(0)
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_add_unknown_product_is_rejected() {
    let client = session_client();
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product_id": Uuid::new_v4() }))
        .send()
        .await
        .expect("Failed to post cart item");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_cart_add_update_remove_flow() {
    let client = session_client();
    let base_url = storefront_base_url();

    let Some(product) = any_in_stock_product(&client).await else {
        return; // Nothing in stock in this environment
    };
    let id = product.get("id").and_then(Value::as_str).expect("product id");

    // Add one unit
    let cart: Value = client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product_id": id }))
        .send()
        .await
        .expect("Failed to add item")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart.get("unit_count").and_then(Value::as_u64), Some(1));

    // Set the quantity to two
    let cart: Value = client
        .put(format!("{base_url}/api/cart/items/{id}"))
        .json(&json!({ "quantity": 2 }))
        .send()
        .await
        .expect("Failed to update item")
        .json()
        .await
        .expect("Failed to parse cart");
    let stock = product.get("stock").and_then(Value::as_u64).unwrap_or(0);
    let expected = 2.min(stock);
    assert_eq!(cart.get("unit_count").and_then(Value::as_u64), Some(expected));

    // A quantity of zero removes the line
    let cart: Value = client
        .put(format!("{base_url}/api/cart/items/{id}"))
        .json(&json!({ "quantity": 0 }))
        .send()
        .await
        .expect("Failed to zero item")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart.get("unit_count").and_then(Value::as_u64), Some(0));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_cart_survives_requests_on_same_session() {
    let client = session_client();
    let base_url = storefront_base_url();

    let Some(product) = any_in_stock_product(&client).await else {
        return;
    };
    let id = product.get("id").and_then(Value::as_str).expect("product id");

    let resp = client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product_id": id }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::OK);

    // Same cookie jar, separate request
    let cart: Value = client
        .get(format!("{base_url}/api/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart.get("unit_count").and_then(Value::as_u64), Some(1));

    // A fresh session sees an empty cart
    let other = session_client();
    let cart: Value = other
        .get(format!("{base_url}/api/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart.get("unit_count").and_then(Value::as_u64), Some(0));

    // Clean up
    let resp = client
        .delete(format!("{base_url}/api/cart"))
        .send()
        .await
        .expect("Failed to clear cart");
    assert_eq!(resp.status(), StatusCode::OK);
}
