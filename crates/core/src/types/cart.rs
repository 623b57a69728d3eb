//! Cart line item entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::Product;

/// A single line in a cart.
///
/// Name and price are cached from the catalog at the moment the item was
/// added; they are refreshed by an authoritative catalog lookup at checkout,
/// so staleness here is cosmetic, never financial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub name: String,
    /// Cached unit price in major currency units.
    pub price: Decimal,
    /// Always at least 1; a line at quantity 0 is removed instead.
    pub quantity: u32,
}

impl CartLineItem {
    /// Create a line for one unit of a product.
    #[must_use]
    pub fn for_product(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            quantity: 1,
        }
    }

    /// Line subtotal: cached price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}
