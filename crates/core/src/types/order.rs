//! Order entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{OrderId, ProductId, UserId};
use super::status::OrderStatus;

/// A line of a placed order.
///
/// Name and price are snapshots taken at purchase time; later catalog edits
/// never retroactively alter historical orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    pub name: String,
    /// Unit price at purchase time, in major currency units.
    pub price: Decimal,
    pub quantity: u32,
}

impl OrderLineItem {
    /// Line subtotal at the snapshotted price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Shipping destination captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub email: Email,
    pub address: String,
    pub city: String,
    pub country: String,
    pub zip_code: String,
}

/// Purchaser identity for orders placed without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub name: String,
    pub email: Email,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Present for orders placed by an authenticated user.
    pub user_id: Option<UserId>,
    /// Present for guest orders.
    pub guest_info: Option<GuestInfo>,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    /// Total in major currency units; equals the sum of line totals.
    pub total_price: Decimal,
    /// Payment gateway reference; the idempotency key for order creation.
    pub payment_reference: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to persist a new order.
///
/// The repository assigns the ID and timestamp; status starts at the value
/// given here (`Paid` for the gateway-confirmed checkout path).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub user_id: Option<UserId>,
    pub guest_info: Option<GuestInfo>,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub total_price: Decimal,
    pub payment_reference: String,
    pub status: OrderStatus,
}

impl OrderDraft {
    /// Recompute the total from the line snapshots.
    #[must_use]
    pub fn computed_total(&self) -> Decimal {
        self.items.iter().map(OrderLineItem::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(price: u32, quantity: u32) -> OrderLineItem {
        OrderLineItem {
            product_id: ProductId::generate(),
            name: "Café molido".to_owned(),
            price: Decimal::from(price),
            quantity,
        }
    }

    #[test]
    fn test_line_total_uses_snapshotted_price() {
        let item = line(1500, 3);
        assert_eq!(item.line_total(), Decimal::from(4500));
    }

    #[test]
    fn test_draft_total_is_sum_of_lines() {
        let draft = OrderDraft {
            user_id: None,
            guest_info: None,
            items: vec![line(1500, 2), line(800, 1)],
            shipping_address: ShippingAddress {
                name: "Ana".to_owned(),
                email: Email::parse("ana@example.com").expect("valid"),
                address: "Avenida Central".to_owned(),
                city: "San José".to_owned(),
                country: "CR".to_owned(),
                zip_code: "10101".to_owned(),
            },
            total_price: Decimal::from(3800),
            payment_reference: "pi_test".to_owned(),
            status: OrderStatus::Paid,
        };
        assert_eq!(draft.computed_total(), draft.total_price);
    }
}
