//! Core types for the Colibri storefront.
//!
//! Type-safe wrappers for common domain concepts plus the cart and order
//! entities that the storefront core operates on.

pub mod cart;
pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod product;
pub mod status;

pub use cart::CartLineItem;
pub use email::{Email, EmailError};
pub use id::{OrderId, ProductId, UserId};
pub use money::{CurrencyCode, Money, MoneyError};
pub use order::{GuestInfo, Order, OrderDraft, OrderLineItem, ShippingAddress};
pub use product::Product;
pub use status::OrderStatus;
