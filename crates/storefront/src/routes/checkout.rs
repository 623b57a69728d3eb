//! Checkout handlers.
//!
//! Two-request flow: `payment-intent` authorizes a charge for the current
//! cart's server-computed total, the browser collects the payment with the
//! returned client secret, then `complete` confirms the charge and places
//! the order. Each request drives a fresh orchestrator; idempotency lives in
//! the payment reference, not in server-side checkout state.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use colibri_core::{GuestInfo, Order, ShippingAddress};

use crate::checkout::{CheckoutOrchestrator, PlaceOrder, Purchaser};
use crate::db::{CartRepository, OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::routes::cart::cart_session;
use crate::services::{EmailClient, PaymentClient};
use crate::state::AppState;

type AppOrchestrator = CheckoutOrchestrator<
    ProductRepository,
    PaymentClient,
    OrderRepository,
    ProductRepository,
    CartRepository,
    EmailClient,
>;

fn orchestrator(state: &AppState) -> AppOrchestrator {
    CheckoutOrchestrator::new(
        state.products().clone(),
        state.payments().clone(),
        state.orders().clone(),
        state.products().clone(),
        state.carts().clone(),
        state.mailer().clone(),
        state.currency(),
        state.operator_email().clone(),
    )
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    /// Provider reference; the client hands it back to `complete`.
    pub payment_reference: String,
    /// Secret the browser needs to collect the payment.
    pub client_secret: String,
    /// Authorized amount in major units.
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub payment_reference: String,
    pub shipping_address: ShippingAddress,
    /// Required for guest checkout, ignored for logged-in users.
    pub guest_info: Option<GuestInfo>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    /// True when this payment reference had already placed an order.
    pub already_placed: bool,
}

/// Authorize a payment for the current cart.
#[instrument(skip_all)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<PaymentIntentResponse>> {
    let cart = cart_session(&state, session, user.as_ref()).load().await?;

    let authorization = orchestrator(&state).begin(cart.items()).await?;
    Ok(Json(PaymentIntentResponse {
        payment_reference: authorization.reference,
        client_secret: authorization.client_secret,
        amount: authorization.amount.amount,
        currency: authorization.amount.currency.code().to_owned(),
    }))
}

/// Confirm the payment and place the order.
#[instrument(skip_all, fields(reference = %request.payment_reference))]
pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<CheckoutResponse>> {
    let carts = cart_session(&state, session, user.as_ref());
    let cart = carts.load().await?;

    let purchaser = match (&user, request.guest_info) {
        (Some(u), _) => Purchaser::User(u.id.clone()),
        (None, Some(guest)) => Purchaser::Guest(guest),
        (None, None) => {
            return Err(AppError::BadRequest(
                "guest checkout requires guest info".to_owned(),
            ));
        }
    };

    let receipt = orchestrator(&state)
        .complete(PlaceOrder {
            payment_reference: request.payment_reference,
            items: cart.into_items(),
            shipping_address: request.shipping_address,
            purchaser,
        })
        .await?;

    // The orchestrator already deleted the server cart for users; guests
    // keep theirs in the session, so empty it here. Best-effort, the order
    // is already placed.
    if user.is_none() {
        if let Err(e) = carts.clear().await {
            tracing::warn!(error = %e, "failed to clear guest cart after checkout");
        }
    }

    Ok(Json(CheckoutResponse {
        order: receipt.order,
        already_placed: receipt.already_placed,
    }))
}
