//! In-memory cart state with stock-bounded quantities.
//!
//! Quantities are clamped against stock, never rejected: an add that would
//! exceed stock is a silent no-op, and an update is capped at stock. That
//! policy keeps the cart UI simple (the button just stops doing anything)
//! and leaves the authoritative rejection to the final checkout stock check.

use rust_decimal::Decimal;

use colibri_core::{CartLineItem, Product, ProductId};

/// The current cart's line items, keyed by product ID.
///
/// Unordered set semantics with stable insertion order for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartStore {
    items: Vec<CartLineItem>,
}

impl CartStore {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Rebuild a cart from persisted line items.
    ///
    /// Duplicate product IDs in the input (which would violate the cart
    /// invariant) are collapsed by summing quantities.
    #[must_use]
    pub fn from_items(items: Vec<CartLineItem>) -> Self {
        let mut store = Self::new();
        for item in items {
            match store.find_mut(item.product_id) {
                Some(existing) => existing.quantity += item.quantity,
                None => store.items.push(item),
            }
        }
        store
    }

    /// Add one unit of a product.
    ///
    /// Increments the existing line if present, otherwise inserts a line at
    /// quantity 1. No-op when the increment would exceed the product's stock
    /// (including stock 0).
    pub fn add_item(&mut self, product: &Product) {
        match self.find_mut(product.id) {
            Some(line) => {
                if line.quantity < product.stock {
                    line.quantity += 1;
                }
            }
            None => {
                if product.in_stock() {
                    self.items.push(CartLineItem::for_product(product));
                }
            }
        }
    }

    /// Remove a line entirely. No-op if absent.
    pub fn remove_item(&mut self, product_id: ProductId) {
        self.items.retain(|line| line.product_id != product_id);
    }

    /// Set a line's quantity, clamped to `stock`.
    ///
    /// A non-positive `quantity` removes the line. No-op if the product is
    /// not in the cart.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64, stock: u32) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        let clamped = u32::try_from(quantity).unwrap_or(u32::MAX).min(stock);
        if clamped == 0 {
            self.remove_item(product_id);
            return;
        }
        if let Some(line) = self.find_mut(product_id) {
            line.quantity = clamped;
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Cart total: sum of cached line prices times quantities, recomputed on
    /// every read.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// The current line items.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Consume the store, returning its line items.
    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    fn find_mut(&mut self, product_id: ProductId) -> Option<&mut CartLineItem> {
        self.items
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(name: &str, price: u32, stock: u32) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_owned(),
            description: None,
            category: "general".to_owned(),
            price: Decimal::from(price),
            stock,
            images: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_item_inserts_then_increments() {
        let p = product("Café", 10, 5);
        let mut cart = CartStore::new();

        cart.add_item(&p);
        cart.add_item(&p);

        // One line, quantity summed; never a duplicate line per product.
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn test_add_item_clamps_silently_at_stock() {
        // Qty 2 in cart, stock 5, two more adds reach 4.
        let p = product("Café", 10, 5);
        let mut cart = CartStore::from_items(vec![CartLineItem {
            product_id: p.id,
            name: p.name.clone(),
            price: p.price,
            quantity: 2,
        }]);

        cart.add_item(&p);
        cart.add_item(&p);
        assert_eq!(cart.items()[0].quantity, 4);
        assert_eq!(cart.total(), Decimal::from(40));

        // At the limit the add becomes a no-op, not an error.
        cart.add_item(&p);
        cart.add_item(&p);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_add_out_of_stock_product_is_noop() {
        let p = product("Agotado", 10, 0);
        let mut cart = CartStore::new();
        cart.add_item(&p);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_clamps_to_stock() {
        let p = product("Café", 10, 3);
        let mut cart = CartStore::new();
        cart.add_item(&p);

        cart.update_quantity(p.id, 10, p.stock);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn test_update_quantity_zero_removes_line() {
        let p = product("Café", 10, 3);
        let mut cart = CartStore::new();
        cart.add_item(&p);

        cart.update_quantity(p.id, 0, p.stock);
        assert!(cart.is_empty());

        cart.add_item(&p);
        cart.update_quantity(p.id, -4, p.stock);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_absent_item_is_noop() {
        let p = product("Café", 10, 3);
        let mut cart = CartStore::new();
        cart.add_item(&p);

        cart.remove_item(ProductId::generate());
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_total_uses_cached_line_price() {
        let p = product("Café", 10, 5);
        let mut cart = CartStore::new();
        cart.add_item(&p);
        cart.add_item(&p);

        // A later catalog price change does not alter the cached line price.
        let mut repriced = p.clone();
        repriced.price = Decimal::from(99);
        cart.add_item(&repriced);

        assert_eq!(cart.items()[0].price, Decimal::from(10));
        assert_eq!(cart.total(), Decimal::from(30));
    }

    #[test]
    fn test_from_items_collapses_duplicates() {
        let p = product("Café", 10, 9);
        let dup = CartLineItem {
            product_id: p.id,
            name: p.name.clone(),
            price: p.price,
            quantity: 2,
        };
        let cart = CartStore::from_items(vec![dup.clone(), dup]);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 4);
    }

    #[test]
    fn test_unit_count() {
        let a = product("A", 10, 5);
        let b = product("B", 20, 5);
        let mut cart = CartStore::new();
        cart.add_item(&a);
        cart.add_item(&a);
        cart.add_item(&b);
        assert_eq!(cart.unit_count(), 3);
    }
}
