//! Guest/server cart reconciliation.
//!
//! When a user logs in, the cart they built anonymously on this device and
//! the cart saved server-side from earlier sessions are merged into one.
//! Quantities are summed for products present in both - the guest additions
//! are intent on top of what was already saved, not a replacement - and the
//! result is clamped against current stock, since products may have sold out
//! or disappeared between sessions.

use std::collections::HashMap;

use colibri_core::{CartLineItem, Product, ProductId};

/// Merge a guest cart into a server cart by product ID.
///
/// Overlapping products get the **sum** of both quantities, keeping the
/// server entry's cached name/price (checkout re-reads the catalog anyway,
/// so merge does not resolve price conflicts). Products present in only one
/// source carry through unchanged. Server entries keep their position;
/// guest-only entries append in guest order.
#[must_use]
pub fn merge_carts(guest: &[CartLineItem], server: &[CartLineItem]) -> Vec<CartLineItem> {
    let mut merged: Vec<CartLineItem> = server.to_vec();
    let mut index: HashMap<ProductId, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, line)| (line.product_id, i))
        .collect();

    for line in guest {
        match index.get(&line.product_id) {
            Some(&i) => {
                if let Some(existing) = merged.get_mut(i) {
                    existing.quantity += line.quantity;
                }
            }
            None => {
                index.insert(line.product_id, merged.len());
                merged.push(line.clone());
            }
        }
    }

    merged
}

/// Clamp merged line items against the current catalog.
///
/// Quantities are capped at each product's stock; lines whose product has no
/// stock left, or no longer exists at all, are dropped.
#[must_use]
pub fn clamp_to_catalog(
    items: Vec<CartLineItem>,
    catalog: &HashMap<ProductId, Product>,
) -> Vec<CartLineItem> {
    items
        .into_iter()
        .filter_map(|mut line| {
            let product = catalog.get(&line.product_id)?;
            if product.stock == 0 {
                return None;
            }
            line.quantity = line.quantity.min(product.stock);
            Some(line)
        })
        .collect()
}
