//! The checkout state machine.
//!
//! Linear, forward-only protocol with a terminal failure state reachable
//! from every step:
//!
//! ```text
//! Idle -> CreatingPaymentAuthorization -> AwaitingPaymentConfirmation
//!      -> CreatingOrder -> DecrementingStock -> Complete
//!      -> Failed(step, reason)   (from any step)
//! ```
//!
//! Steps 1-3 (authorization, confirmation, order creation) are fail-fast and
//! user-blocking. Step 4 (stock decrement) and step 5 (cart cleanup and
//! notifications) run after the order is committed and never reverse it:
//! their failures are logged for out-of-band reconciliation. There is no
//! partial-resume path; a failed checkout restarts from the beginning.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use colibri_core::{
    CartLineItem, CurrencyCode, Email, GuestInfo, Money, Order, OrderDraft, OrderId,
    OrderLineItem, OrderStatus, ProductId, ShippingAddress, UserId,
};

use super::{Notifier, OrderStore, PaymentGateway, StockDecrement, StockLedger};
use crate::cart::UserCartStore;
use crate::db::RepositoryError;
use crate::services::payment::{ConfirmationStatus, PaymentAuthorization, PaymentError};

/// The step at which a checkout failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    PaymentAuthorization,
    PaymentConfirmation,
    OrderCreation,
    StockDecrement,
    PostSuccess,
}

/// Named states of the checkout protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    Idle,
    CreatingPaymentAuthorization,
    AwaitingPaymentConfirmation,
    CreatingOrder,
    DecrementingStock,
    Complete(OrderId),
    Failed { step: CheckoutStep, reason: String },
}

/// One product the buyer wants more of than the shelf holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub name: String,
    pub requested: u32,
    pub available: u32,
}

/// Errors terminating a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Request-level problem (empty cart, malformed fields). Nothing was
    /// attempted; safe to fix and resubmit.
    #[error("{0}")]
    Validation(String),

    /// The last authoritative stock check rejected the cart.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<StockShortage>),

    /// The payment collaborator failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The payment exists but is not in a confirmed state.
    #[error("payment not completed: {0}")]
    PaymentNotSucceeded(ConfirmationStatus),

    /// The confirmed charge does not cover the order total.
    #[error("charged amount {charged_minor} does not match order total {expected}")]
    AmountMismatch { expected: Money, charged_minor: i64 },

    /// The charge settled in a different currency than the store prices in,
    /// so its minor-unit amount is not comparable to the order total.
    #[error("payment settled in {charged} but orders are priced in {expected}")]
    CurrencyMismatch {
        expected: CurrencyCode,
        charged: String,
    },

    /// Storage failure before any payment was taken.
    #[error(transparent)]
    Persistence(RepositoryError),

    /// Storage failure after payment succeeded. The reference is carried so
    /// the buyer-facing message can state that payment was taken and must
    /// not be lost.
    #[error("payment {reference} was received but the order could not be recorded: {source}")]
    OrderPersistence {
        reference: String,
        source: RepositoryError,
    },
}

/// Who is placing the order.
#[derive(Debug, Clone, PartialEq)]
pub enum Purchaser {
    User(UserId),
    Guest(GuestInfo),
}

/// A request to finish checkout for a confirmed payment.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub payment_reference: String,
    pub items: Vec<CartLineItem>,
    pub shipping_address: ShippingAddress,
    pub purchaser: Purchaser,
}

/// Result of a completed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    /// True when the payment reference already had an order (a retried
    /// request); the existing order is returned instead of a duplicate.
    pub already_placed: bool,
}

/// Drives a single checkout attempt through its steps.
///
/// One orchestrator per attempt: state is not reused across attempts. All
/// collaborators are injected, so the whole protocol runs against in-memory
/// fakes in tests.
pub struct CheckoutOrchestrator<C, P, O, S, K, N> {
    catalog: C,
    payments: P,
    orders: O,
    stock: S,
    carts: K,
    notifier: N,
    currency: CurrencyCode,
    operator: Email,
    state: CheckoutState,
}

impl<C, P, O, S, K, N> CheckoutOrchestrator<C, P, O, S, K, N>
where
    C: crate::cart::Catalog + Sync,
    P: PaymentGateway + Sync,
    O: OrderStore + Sync,
    S: StockLedger + Sync,
    K: UserCartStore + Sync,
    N: Notifier + Sync,
{
    /// Create an orchestrator in the `Idle` state.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        catalog: C,
        payments: P,
        orders: O,
        stock: S,
        carts: K,
        notifier: N,
        currency: CurrencyCode,
        operator: Email,
    ) -> Self {
        Self {
            catalog,
            payments,
            orders,
            stock,
            carts,
            notifier,
            currency,
            operator,
            state: CheckoutState::Idle,
        }
    }

    /// Current protocol state.
    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// Step 1: request a payment authorization for the cart.
    ///
    /// The total is recomputed from the catalog, never taken from the
    /// client. Failure here is terminal but side-effect free; the buyer can
    /// simply retry.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for an empty or worthless cart
    /// and `CheckoutError::Payment` if the gateway refuses.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn begin(
        &mut self,
        items: &[CartLineItem],
    ) -> Result<PaymentAuthorization, CheckoutError> {
        self.transition(CheckoutState::CreatingPaymentAuthorization);

        if items.is_empty() {
            return self.fail(
                CheckoutStep::PaymentAuthorization,
                CheckoutError::Validation("cart is empty".to_owned()),
            );
        }

        let total = match self.authoritative_total(items).await {
            Ok(total) => total,
            Err(e) => return self.fail(CheckoutStep::PaymentAuthorization, e),
        };
        if total.is_zero() {
            return self.fail(
                CheckoutStep::PaymentAuthorization,
                CheckoutError::Validation(
                    "cart is empty or its products no longer exist".to_owned(),
                ),
            );
        }

        let amount = Money::new(total, self.currency);
        match self.payments.create_authorization(amount).await {
            Ok(authorization) => {
                self.transition(CheckoutState::AwaitingPaymentConfirmation);
                Ok(authorization)
            }
            Err(e) => self.fail(CheckoutStep::PaymentAuthorization, e.into()),
        }
    }

    /// Steps 2-5: confirm the payment, persist the order, decrement stock,
    /// and fire the post-success side effects.
    ///
    /// Idempotent per payment reference: a retried request returns the
    /// existing order.
    ///
    /// # Errors
    ///
    /// Fail-fast errors from confirmation and order creation. Stock
    /// decrement and notification failures after the order is committed are
    /// logged, not returned.
    #[instrument(skip(self, request), fields(reference = %request.payment_reference))]
    pub async fn complete(
        &mut self,
        request: PlaceOrder,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if self.state == CheckoutState::Idle {
            // The HTTP flow runs begin/complete on separate requests, so a
            // fresh orchestrator picks the protocol up at confirmation.
            self.transition(CheckoutState::AwaitingPaymentConfirmation);
        }

        // Step 2: payment confirmation.
        let confirmation = match self.payments.confirmation(&request.payment_reference).await {
            Ok(confirmation) => confirmation,
            Err(e) => return self.fail(CheckoutStep::PaymentConfirmation, e.into()),
        };
        if confirmation.status != ConfirmationStatus::Succeeded {
            return self.fail(
                CheckoutStep::PaymentConfirmation,
                CheckoutError::PaymentNotSucceeded(confirmation.status),
            );
        }
        // The minor-unit comparison below is meaningless across currencies.
        if !self.currency.matches(&confirmation.currency) {
            return self.fail(
                CheckoutStep::PaymentConfirmation,
                CheckoutError::CurrencyMismatch {
                    expected: self.currency,
                    charged: confirmation.currency,
                },
            );
        }

        // Idempotency: one order per payment reference, ever.
        match self
            .orders
            .find_by_payment_reference(&request.payment_reference)
            .await
        {
            Ok(Some(existing)) => {
                self.transition(CheckoutState::Complete(existing.id));
                return Ok(CheckoutReceipt {
                    order: existing,
                    already_placed: true,
                });
            }
            Ok(None) => {}
            Err(e) => {
                return self.fail(
                    CheckoutStep::OrderCreation,
                    CheckoutError::Persistence(e),
                );
            }
        }

        // Step 3: last authoritative stock check + snapshot + persist.
        self.transition(CheckoutState::CreatingOrder);
        let order = match self.create_order(&request, confirmation.amount_minor).await {
            Ok(order) => order,
            Err(e) => return self.fail(CheckoutStep::OrderCreation, e),
        };

        // Step 4: best-effort atomic decrements; the order stands even if
        // one of them fails, and the failure becomes a reconciliation task.
        self.transition(CheckoutState::DecrementingStock);
        self.decrement_stock(&order).await;

        // Step 5: best-effort side effects.
        self.post_success(&order).await;

        self.transition(CheckoutState::Complete(order.id));
        Ok(CheckoutReceipt {
            order,
            already_placed: false,
        })
    }

    /// Recompute the cart total from current catalog prices. Lines whose
    /// product has vanished contribute nothing; the zero-total guard and the
    /// order-creation stock check catch carts made entirely of ghosts.
    async fn authoritative_total(
        &self,
        items: &[CartLineItem],
    ) -> Result<Decimal, CheckoutError> {
        let ids: Vec<ProductId> = items.iter().map(|line| line.product_id).collect();
        let products = self
            .catalog
            .products_by_ids(&ids)
            .await
            .map_err(CheckoutError::Persistence)?;
        let by_id: HashMap<ProductId, Decimal> =
            products.into_iter().map(|p| (p.id, p.price)).collect();

        Ok(items
            .iter()
            .filter_map(|line| {
                by_id
                    .get(&line.product_id)
                    .map(|price| *price * Decimal::from(line.quantity))
            })
            .sum())
    }

    async fn create_order(
        &self,
        request: &PlaceOrder,
        charged_minor: i64,
    ) -> Result<Order, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::Validation("cart is empty".to_owned()));
        }

        let ids: Vec<ProductId> = request.items.iter().map(|line| line.product_id).collect();
        let products = self
            .catalog
            .products_by_ids(&ids)
            .await
            .map_err(CheckoutError::Persistence)?;
        let by_id: HashMap<ProductId, _> = products.into_iter().map(|p| (p.id, p)).collect();

        let mut shortages = Vec::new();
        let mut lines = Vec::new();
        for item in &request.items {
            match by_id.get(&item.product_id) {
                None => shortages.push(StockShortage {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    requested: item.quantity,
                    available: 0,
                }),
                Some(product) if product.stock < item.quantity => shortages.push(StockShortage {
                    product_id: item.product_id,
                    name: product.name.clone(),
                    requested: item.quantity,
                    available: product.stock,
                }),
                // Snapshot name and price from the catalog, not from the
                // cart's cached copies: later catalog edits must never
                // rewrite history, and stale cart caches must not set it.
                Some(product) => lines.push(OrderLineItem {
                    product_id: item.product_id,
                    name: product.name.clone(),
                    price: product.price,
                    quantity: item.quantity,
                }),
            }
        }
        if !shortages.is_empty() {
            return Err(CheckoutError::InsufficientStock(shortages));
        }

        let total: Decimal = lines.iter().map(OrderLineItem::line_total).sum();
        let expected = Money::new(total, self.currency);
        let expected_minor = expected
            .minor_units()
            .map_err(|e| CheckoutError::Validation(format!("invalid order amount: {e}")))?;
        if charged_minor != expected_minor {
            return Err(CheckoutError::AmountMismatch {
                expected,
                charged_minor,
            });
        }

        let (user_id, guest_info) = match &request.purchaser {
            Purchaser::User(user) => (Some(user.clone()), None),
            Purchaser::Guest(guest) => (None, Some(guest.clone())),
        };

        let draft = OrderDraft {
            user_id,
            guest_info,
            items: lines,
            shipping_address: request.shipping_address.clone(),
            total_price: total,
            payment_reference: request.payment_reference.clone(),
            status: OrderStatus::Paid,
        };

        self.orders
            .create(draft)
            .await
            .map_err(|source| CheckoutError::OrderPersistence {
                reference: request.payment_reference.clone(),
                source,
            })
    }

    async fn decrement_stock(&self, order: &Order) {
        for line in &order.items {
            match self.stock.decrement(line.product_id, line.quantity).await {
                Ok(StockDecrement::Applied) => {}
                Ok(StockDecrement::Insufficient { available }) => {
                    tracing::error!(
                        order_id = %order.id,
                        product_id = %line.product_id,
                        requested = line.quantity,
                        available,
                        "stock decrement lost a race after order commit; needs inventory reconciliation"
                    );
                }
                Ok(StockDecrement::ProductMissing) => {
                    tracing::error!(
                        order_id = %order.id,
                        product_id = %line.product_id,
                        "ordered product vanished before stock decrement; needs inventory reconciliation"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        order_id = %order.id,
                        product_id = %line.product_id,
                        error = %e,
                        "stock decrement failed after order commit; needs inventory reconciliation"
                    );
                }
            }
        }
    }

    async fn post_success(&self, order: &Order) {
        if let Some(user) = &order.user_id {
            if let Err(e) = self.carts.delete(user).await {
                tracing::warn!(order_id = %order.id, error = %e, "failed to delete server cart after checkout");
            }
        }

        let summary = order_summary(order);
        let buyer = &order.shipping_address.email;
        if let Err(e) = self
            .notifier
            .notify(buyer, &format!("Order confirmed - {}", short_id(order.id)), &summary)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "buyer confirmation email failed");
        }
        if let Err(e) = self
            .notifier
            .notify(
                &self.operator,
                &format!("New order {}", short_id(order.id)),
                &summary,
            )
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "operator notification failed");
        }
    }

    /// The single place state changes.
    fn transition(&mut self, next: CheckoutState) {
        tracing::debug!(from = ?self.state, to = ?next, "checkout transition");
        self.state = next;
    }

    fn fail<T>(&mut self, step: CheckoutStep, err: CheckoutError) -> Result<T, CheckoutError> {
        tracing::warn!(step = ?step, error = %err, "checkout failed");
        self.state = CheckoutState::Failed {
            step,
            reason: err.to_string(),
        };
        Err(err)
    }
}

/// First segment of an order ID, for subjects and human references.
fn short_id(id: OrderId) -> String {
    id.to_string().chars().take(8).collect()
}

/// Plain-text order summary for notification bodies.
fn order_summary(order: &Order) -> String {
    use std::fmt::Write as _;

    let mut body = format!("Order {}\n\n", order.id);
    for line in &order.items {
        let _ = writeln!(
            body,
            "{} x {} @ {} = {}",
            line.name,
            line.quantity,
            line.price,
            line.line_total()
        );
    }
    let _ = write!(body, "\nTotal: {}", order.total_price);
    let _ = write!(body, "\nShip to: {}, {}", order.shipping_address.address, order.shipping_address.city);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    use colibri_core::Product;

    use crate::cart::Catalog;
    use crate::services::email::NotificationError;
    use crate::services::payment::PaymentConfirmation;

    // ------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------

    struct FakeCatalog {
        products: Mutex<HashMap<ProductId, Product>>,
    }

    impl FakeCatalog {
        fn with(products: &[Product]) -> Self {
            Self {
                products: Mutex::new(products.iter().map(|p| (p.id, p.clone())).collect()),
            }
        }
    }

    impl Catalog for &FakeCatalog {
        async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            Ok(self.products.lock().expect("lock").get(&id).cloned())
        }

        async fn products_by_ids(
            &self,
            ids: &[ProductId],
        ) -> Result<Vec<Product>, RepositoryError> {
            let products = self.products.lock().expect("lock");
            Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
        }
    }

    #[derive(Default)]
    struct FakePayments {
        confirmations: Mutex<HashMap<String, PaymentConfirmation>>,
        created: Mutex<Vec<Money>>,
        refuse_authorization: bool,
    }

    impl FakePayments {
        fn confirming(reference: &str, status: ConfirmationStatus, amount_minor: i64) -> Self {
            Self::confirming_in(reference, status, amount_minor, "crc")
        }

        fn confirming_in(
            reference: &str,
            status: ConfirmationStatus,
            amount_minor: i64,
            currency: &str,
        ) -> Self {
            let confirmation = PaymentConfirmation {
                reference: reference.to_owned(),
                status,
                amount_minor,
                currency: currency.to_owned(),
            };
            Self {
                confirmations: Mutex::new([(reference.to_owned(), confirmation)].into()),
                ..Self::default()
            }
        }
    }

    impl PaymentGateway for &FakePayments {
        async fn create_authorization(
            &self,
            amount: Money,
        ) -> Result<PaymentAuthorization, PaymentError> {
            if self.refuse_authorization {
                return Err(PaymentError::Api {
                    status: 402,
                    message: "card testing suspected".to_owned(),
                });
            }
            self.created.lock().expect("lock").push(amount);
            Ok(PaymentAuthorization {
                reference: "pi_fake".to_owned(),
                client_secret: "pi_fake_secret".to_owned(),
                amount,
            })
        }

        async fn confirmation(
            &self,
            reference: &str,
        ) -> Result<PaymentConfirmation, PaymentError> {
            self.confirmations
                .lock()
                .expect("lock")
                .get(reference)
                .cloned()
                .ok_or_else(|| PaymentError::Api {
                    status: 404,
                    message: format!("no such payment intent: {reference}"),
                })
        }
    }

    #[derive(Default)]
    struct FakeOrders {
        by_reference: Mutex<HashMap<String, Order>>,
    }

    impl OrderStore for &FakeOrders {
        async fn find_by_payment_reference(
            &self,
            reference: &str,
        ) -> Result<Option<Order>, RepositoryError> {
            Ok(self.by_reference.lock().expect("lock").get(reference).cloned())
        }

        async fn create(&self, draft: OrderDraft) -> Result<Order, RepositoryError> {
            let mut orders = self.by_reference.lock().expect("lock");
            // Mirrors ON CONFLICT DO NOTHING: the first insert wins.
            if let Some(existing) = orders.get(&draft.payment_reference) {
                return Ok(existing.clone());
            }
            let order = Order {
                id: OrderId::generate(),
                user_id: draft.user_id,
                guest_info: draft.guest_info,
                items: draft.items,
                shipping_address: draft.shipping_address,
                total_price: draft.total_price,
                payment_reference: draft.payment_reference.clone(),
                status: draft.status,
                created_at: Utc::now(),
            };
            orders.insert(draft.payment_reference, order.clone());
            Ok(order)
        }
    }

    // Stock lives in the catalog fake so validation and decrement agree.
    struct FakeLedger<'a> {
        catalog: &'a FakeCatalog,
    }

    impl StockLedger for FakeLedger<'_> {
        async fn decrement(
            &self,
            id: ProductId,
            quantity: u32,
        ) -> Result<StockDecrement, RepositoryError> {
            let mut products = self.catalog.products.lock().expect("lock");
            match products.get_mut(&id) {
                None => Ok(StockDecrement::ProductMissing),
                Some(product) if product.stock < quantity => Ok(StockDecrement::Insufficient {
                    available: product.stock,
                }),
                Some(product) => {
                    product.stock -= quantity;
                    Ok(StockDecrement::Applied)
                }
            }
        }
    }

    #[derive(Default)]
    struct FakeCarts {
        deleted: Mutex<Vec<String>>,
    }

    impl UserCartStore for &FakeCarts {
        async fn load(&self, _user: &UserId) -> Result<Vec<CartLineItem>, crate::cart::session::CartError> {
            Ok(Vec::new())
        }

        async fn save(
            &self,
            _user: &UserId,
            _items: &[CartLineItem],
        ) -> Result<(), crate::cart::session::CartError> {
            Ok(())
        }

        async fn delete(&self, user: &UserId) -> Result<(), crate::cart::session::CartError> {
            self.deleted.lock().expect("lock").push(user.as_str().to_owned());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl Notifier for &FakeNotifier {
        async fn notify(
            &self,
            recipient: &Email,
            subject: &str,
            _body: &str,
        ) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Api {
                    status: 500,
                    message: "mail relay down".to_owned(),
                });
            }
            self.sent
                .lock()
                .expect("lock")
                .push((recipient.as_str().to_owned(), subject.to_owned()));
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

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

    fn line(product: &Product, quantity: u32) -> CartLineItem {
        CartLineItem {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            quantity,
        }
    }

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            name: "Ana Mora".to_owned(),
            email: Email::parse("ana@example.com").expect("valid"),
            address: "Avenida Central 42".to_owned(),
            city: "San José".to_owned(),
            country: "CR".to_owned(),
            zip_code: "10101".to_owned(),
        }
    }

    fn operator() -> Email {
        Email::parse("orders@example.com").expect("valid")
    }

    fn place_order(reference: &str, items: Vec<CartLineItem>) -> PlaceOrder {
        PlaceOrder {
            payment_reference: reference.to_owned(),
            items,
            shipping_address: shipping(),
            purchaser: Purchaser::User(UserId::new("uid-1")),
        }
    }

    macro_rules! orchestrator {
        ($catalog:expr, $payments:expr, $orders:expr, $carts:expr, $notifier:expr) => {
            CheckoutOrchestrator::new(
                $catalog,
                $payments,
                $orders,
                FakeLedger { catalog: $catalog },
                $carts,
                $notifier,
                CurrencyCode::Crc,
                operator(),
            )
        };
    }

    // ------------------------------------------------------------------
    // begin
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_begin_charges_catalog_total_not_client_total() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments = FakePayments::default();
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);

        // The cart caches a stale price; the authorization uses the catalog's.
        let mut stale = line(&p, 2);
        stale.price = Decimal::from(1);
        let auth = checkout.begin(&[stale]).await.expect("begin");

        assert_eq!(auth.amount.amount, Decimal::from(3000));
        assert_eq!(
            checkout.state(),
            &CheckoutState::AwaitingPaymentConfirmation
        );
        assert_eq!(payments.created.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn test_begin_rejects_empty_cart() {
        let catalog = FakeCatalog::with(&[]);
        let payments = FakePayments::default();
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout.begin(&[]).await;

        assert!(matches!(err, Err(CheckoutError::Validation(_))));
        assert!(matches!(
            checkout.state(),
            CheckoutState::Failed {
                step: CheckoutStep::PaymentAuthorization,
                ..
            }
        ));
        assert!(payments.created.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_begin_gateway_refusal_is_terminal_and_side_effect_free() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments = FakePayments {
            refuse_authorization: true,
            ..FakePayments::default()
        };
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout.begin(&[line(&p, 1)]).await;

        assert!(matches!(err, Err(CheckoutError::Payment(_))));
        assert!(orders.by_reference.lock().expect("lock").is_empty());
    }

    // ------------------------------------------------------------------
    // complete
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_complete_happy_path() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments =
            FakePayments::confirming("pi_123", ConfirmationStatus::Succeeded, 3000);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let receipt = checkout
            .complete(place_order("pi_123", vec![line(&p, 2)]))
            .await
            .expect("complete");

        assert!(!receipt.already_placed);
        assert_eq!(receipt.order.status, OrderStatus::Paid);
        assert_eq!(receipt.order.total_price, Decimal::from(3000));
        assert_eq!(receipt.order.payment_reference, "pi_123");
        assert_eq!(checkout.state(), &CheckoutState::Complete(receipt.order.id));

        // Stock was decremented, the server cart deleted, both mails sent.
        let stock = catalog.products.lock().expect("lock")[&p.id].stock;
        assert_eq!(stock, 8);
        assert_eq!(*carts.deleted.lock().expect("lock"), vec!["uid-1".to_owned()]);
        assert_eq!(notifier.sent.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn test_failed_confirmation_commits_nothing() {
        // Confirmation comes back failed: no order, no stock change, a
        // payment error for the buyer.
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments = FakePayments::confirming("pi_bad", ConfirmationStatus::Failed, 3000);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout
            .complete(place_order("pi_bad", vec![line(&p, 2)]))
            .await;

        assert!(matches!(err, Err(CheckoutError::PaymentNotSucceeded(_))));
        assert!(matches!(
            checkout.state(),
            CheckoutState::Failed {
                step: CheckoutStep::PaymentConfirmation,
                ..
            }
        ));
        assert!(orders.by_reference.lock().expect("lock").is_empty());
        assert_eq!(catalog.products.lock().expect("lock")[&p.id].stock, 10);
        assert!(carts.deleted.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_requires_action_halts_without_side_effects() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments =
            FakePayments::confirming("pi_3ds", ConfirmationStatus::RequiresAction, 3000);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout
            .complete(place_order("pi_3ds", vec![line(&p, 2)]))
            .await;

        assert!(matches!(
            err,
            Err(CheckoutError::PaymentNotSucceeded(
                ConfirmationStatus::RequiresAction
            ))
        ));
        assert!(orders.by_reference.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_itemized_and_blocks_the_order() {
        let p1 = product("Café", 1000, 1);
        let p2 = product("Miel", 2000, 5);
        let catalog = FakeCatalog::with(&[p1.clone(), p2.clone()]);
        let payments =
            FakePayments::confirming("pi_123", ConfirmationStatus::Succeeded, 7000);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout
            .complete(place_order("pi_123", vec![line(&p1, 3), line(&p2, 2)]))
            .await;

        match err {
            Err(CheckoutError::InsufficientStock(shortages)) => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].product_id, p1.id);
                assert_eq!(shortages[0].requested, 3);
                assert_eq!(shortages[0].available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert!(orders.by_reference.lock().expect("lock").is_empty());
        // Nothing was decremented, including the satisfiable line.
        assert_eq!(catalog.products.lock().expect("lock")[&p2.id].stock, 5);
    }

    #[tokio::test]
    async fn test_retry_with_same_reference_returns_existing_order() {
        // A retried "pi_123" must not create a second order.
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments =
            FakePayments::confirming("pi_123", ConfirmationStatus::Succeeded, 3000);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let first = {
            let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
            checkout
                .complete(place_order("pi_123", vec![line(&p, 2)]))
                .await
                .expect("first")
        };

        let mut retry = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let second = retry
            .complete(place_order("pi_123", vec![line(&p, 2)]))
            .await
            .expect("retry");

        assert!(second.already_placed);
        assert_eq!(second.order.id, first.order.id);
        assert_eq!(orders.by_reference.lock().expect("lock").len(), 1);
        // The retry decremented nothing further.
        assert_eq!(catalog.products.lock().expect("lock")[&p.id].stock, 8);
    }

    #[tokio::test]
    async fn test_amount_mismatch_blocks_the_order() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        // Confirmed charge of 1 colón against a 3000 colón order.
        let payments = FakePayments::confirming("pi_123", ConfirmationStatus::Succeeded, 1);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout
            .complete(place_order("pi_123", vec![line(&p, 2)]))
            .await;

        assert!(matches!(err, Err(CheckoutError::AmountMismatch { .. })));
        assert!(orders.by_reference.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_currency_mismatch_blocks_the_order() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        // 3000 USD cents are not 3000 colones, even though the minor-unit
        // numbers agree.
        let payments =
            FakePayments::confirming_in("pi_123", ConfirmationStatus::Succeeded, 3000, "usd");
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let err = checkout
            .complete(place_order("pi_123", vec![line(&p, 2)]))
            .await;

        assert!(matches!(err, Err(CheckoutError::CurrencyMismatch { .. })));
        assert!(orders.by_reference.lock().expect("lock").is_empty());
        assert_eq!(catalog.products.lock().expect("lock")[&p.id].stock, 10);
        assert!(matches!(
            checkout.state(),
            CheckoutState::Failed {
                step: CheckoutStep::PaymentConfirmation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_notification_failure_never_fails_the_checkout() {
        let p = product("Café", 1500, 10);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments =
            FakePayments::confirming("pi_123", ConfirmationStatus::Succeeded, 1500);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier {
            fail: true,
            ..FakeNotifier::default()
        };

        let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
        let receipt = checkout
            .complete(place_order("pi_123", vec![line(&p, 1)]))
            .await
            .expect("complete despite notifier failure");

        assert_eq!(receipt.order.status, OrderStatus::Paid);
        assert!(matches!(checkout.state(), CheckoutState::Complete(_)));
    }

    #[tokio::test]
    async fn test_post_order_stock_race_does_not_roll_back() {
        // Validation passes, then stock vanishes before the decrement (a
        // concurrent checkout won the race). The order stands; the shortfall
        // is a logged reconciliation task.
        let p = product("Café", 1500, 2);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments =
            FakePayments::confirming("pi_123", ConfirmationStatus::Succeeded, 3000);
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        struct RacingLedger<'a> {
            catalog: &'a FakeCatalog,
        }
        impl StockLedger for RacingLedger<'_> {
            async fn decrement(
                &self,
                id: ProductId,
                _quantity: u32,
            ) -> Result<StockDecrement, RepositoryError> {
                // Someone else emptied the shelf between check and decrement.
                self.catalog
                    .products
                    .lock()
                    .expect("lock")
                    .get_mut(&id)
                    .map_or(Ok(StockDecrement::ProductMissing), |product| {
                        product.stock = 0;
                        Ok(StockDecrement::Insufficient { available: 0 })
                    })
            }
        }

        let mut checkout = CheckoutOrchestrator::new(
            &catalog,
            &payments,
            &orders,
            RacingLedger { catalog: &catalog },
            &carts,
            &notifier,
            CurrencyCode::Crc,
            operator(),
        );
        let receipt = checkout
            .complete(place_order("pi_123", vec![line(&p, 2)]))
            .await
            .expect("order survives the decrement shortfall");

        assert!(matches!(checkout.state(), CheckoutState::Complete(_)));
        assert_eq!(orders.by_reference.lock().expect("lock").len(), 1);
        assert_eq!(receipt.order.total_price, Decimal::from(3000));
    }

    #[tokio::test]
    async fn test_combined_demand_beyond_stock_cannot_oversell() {
        // Two checkouts want 2 units each from a shelf of 3: at most 3 units
        // are sold and the loser gets an itemized shortage.
        let p = product("Café", 1000, 3);
        let catalog = FakeCatalog::with(&[p.clone()]);
        let payments = FakePayments {
            confirmations: Mutex::new(
                [
                    (
                        "pi_a".to_owned(),
                        PaymentConfirmation {
                            reference: "pi_a".to_owned(),
                            status: ConfirmationStatus::Succeeded,
                            amount_minor: 2000,
                            currency: "crc".to_owned(),
                        },
                    ),
                    (
                        "pi_b".to_owned(),
                        PaymentConfirmation {
                            reference: "pi_b".to_owned(),
                            status: ConfirmationStatus::Succeeded,
                            amount_minor: 2000,
                            currency: "crc".to_owned(),
                        },
                    ),
                ]
                .into(),
            ),
            ..FakePayments::default()
        };
        let orders = FakeOrders::default();
        let carts = FakeCarts::default();
        let notifier = FakeNotifier::default();

        let first = {
            let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
            checkout
                .complete(place_order("pi_a", vec![line(&p, 2)]))
                .await
        };
        let second = {
            let mut checkout = orchestrator!(&catalog, &payments, &orders, &carts, &notifier);
            checkout
                .complete(place_order("pi_b", vec![line(&p, 2)]))
                .await
        };

        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(CheckoutError::InsufficientStock(_))
        ));
        // 2 of 3 units sold; stock never went negative.
        assert_eq!(catalog.products.lock().expect("lock")[&p.id].stock, 1);
    }
}
