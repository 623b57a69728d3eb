//! Checkout core: the multi-step protocol that turns a cart into a paid
//! order.
//!
//! The sequence is deliberately non-atomic and observable: payment
//! authorization, payment confirmation, order creation, stock decrement, and
//! post-success side effects are distinct steps with distinct failure
//! behavior. Steps before order creation are fail-fast; everything after is
//! best-effort and never reverses a committed order.

pub mod orchestrator;

pub use orchestrator::{
    CheckoutError, CheckoutOrchestrator, CheckoutReceipt, CheckoutState, CheckoutStep,
    PlaceOrder, Purchaser, StockShortage,
};

use colibri_core::{Email, Money, Order, OrderDraft, ProductId};

use crate::db::RepositoryError;
use crate::services::email::NotificationError;
use crate::services::payment::{PaymentAuthorization, PaymentConfirmation, PaymentError};

/// Outcome of an atomic stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The units were taken off stock.
    Applied,
    /// The guard refused: fewer units are available than requested.
    Insufficient { available: u32 },
    /// The product row no longer exists.
    ProductMissing,
}

/// Payment collaborator as the orchestrator consumes it.
pub trait PaymentGateway {
    /// Request an authorization for the given amount.
    fn create_authorization(
        &self,
        amount: Money,
    ) -> impl Future<Output = Result<PaymentAuthorization, PaymentError>> + Send;

    /// Look up the confirmation result for an authorization reference.
    fn confirmation(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<PaymentConfirmation, PaymentError>> + Send;
}

/// Order persistence as the orchestrator consumes it.
pub trait OrderStore {
    /// Find an order previously created for a payment reference.
    fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Persist an order. Must be idempotent on the draft's payment
    /// reference: a concurrent duplicate returns the already-stored order.
    fn create(
        &self,
        draft: OrderDraft,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

/// Stock mutation as the orchestrator consumes it.
pub trait StockLedger {
    /// Atomically decrement a product's stock.
    fn decrement(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<StockDecrement, RepositoryError>> + Send;
}

/// Notification collaborator; fire-and-forget from the orchestrator's
/// perspective.
pub trait Notifier {
    fn notify(
        &self,
        recipient: &Email,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;
}
