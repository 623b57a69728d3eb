//! Card payment client (Stripe-compatible REST API).
//!
//! Two calls only: create a payment intent for an amount, and retrieve an
//! intent by ID to learn its final status. Amounts cross this boundary in the
//! currency's minor units, which for the default colón currency means the
//! unscaled amount (exponent 0).
//!
//! # API Reference
//!
//! - Base URL: `https://api.stripe.com` (overridable for tests)
//! - Authentication: secret key via `Authorization: Bearer <key>`
//! - Requests are form-encoded, responses are JSON

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use colibri_core::{Money, MoneyError};

use crate::checkout::PaymentGateway;
use crate::config::PaymentConfig;

/// Errors from the payment API.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("payment API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The order amount cannot be expressed in minor units.
    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A freshly created payment intent, handed to the client for collection.
#[derive(Debug, Clone)]
pub struct PaymentAuthorization {
    /// Provider intent ID, used as the order's payment reference.
    pub reference: String,
    /// Secret the browser needs to collect the payment.
    pub client_secret: String,
    /// The authorized amount.
    pub amount: Money,
}

/// Outcome of a payment as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub reference: String,
    pub status: ConfirmationStatus,
    /// Charged amount in the currency's minor units.
    pub amount_minor: i64,
    /// Lowercase ISO currency code.
    pub currency: String,
}

/// Provider payment statuses collapsed to what checkout cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// The charge went through.
    Succeeded,
    /// Still in flight (processing, 3DS challenge, awaiting capture).
    RequiresAction,
    /// Cancelled or the payment method was rejected.
    Failed,
}

impl ConfirmationStatus {
    fn from_api(status: &str) -> Self {
        match status {
            "succeeded" => Self::Succeeded,
            "processing" | "requires_action" | "requires_confirmation" | "requires_capture" => {
                Self::RequiresAction
            }
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::RequiresAction => "requires action",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Payment API client.
#[derive(Clone)]
pub struct PaymentClient {
    inner: Arc<PaymentClientInner>,
}

struct PaymentClientInner {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl PaymentClient {
    /// Create a new payment API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Parse(format!("invalid secret key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            inner: Arc::new(PaymentClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_owned(),
            }),
        })
    }

    /// Create a payment intent for the given amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not representable in minor units,
    /// the request fails, or the API rejects it.
    pub async fn create_payment_intent(
        &self,
        amount: Money,
    ) -> Result<PaymentAuthorization, PaymentError> {
        let minor = amount.minor_units()?;
        let url = format!("{}/v1/payment_intents", self.inner.api_base);
        let params = [
            ("amount", minor.to_string()),
            ("currency", amount.currency.code().to_owned()),
            ("automatic_payment_methods[enabled]", "true".to_owned()),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;
        let intent = Self::handle_response(response).await?;
        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Parse("payment intent without client secret".into()))?;

        Ok(PaymentAuthorization {
            reference: intent.id,
            client_secret,
            amount,
        })
    }

    /// Retrieve a payment intent by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the intent does not exist.
    pub async fn retrieve_payment_intent(
        &self,
        reference: &str,
    ) -> Result<PaymentConfirmation, PaymentError> {
        let url = format!("{}/v1/payment_intents/{reference}", self.inner.api_base);
        let response = self.inner.client.get(&url).send().await?;
        let intent = Self::handle_response(response).await?;

        Ok(PaymentConfirmation {
            reference: intent.id,
            status: ConfirmationStatus::from_api(&intent.status),
            amount_minor: intent.amount,
            currency: intent.currency,
        })
    }

    async fn handle_response(response: reqwest::Response) -> Result<PaymentIntent, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<PaymentIntent>()
                .await
                .map_err(|e| PaymentError::Parse(e.to_string()));
        }

        let message = response
            .json::<ApiErrorEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| "unknown error".to_owned());
        Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl PaymentGateway for PaymentClient {
    async fn create_authorization(
        &self,
        amount: Money,
    ) -> Result<PaymentAuthorization, PaymentError> {
        self.create_payment_intent(amount).await
    }

    async fn confirmation(&self, reference: &str) -> Result<PaymentConfirmation, PaymentError> {
        self.retrieve_payment_intent(reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ConfirmationStatus::from_api("succeeded"),
            ConfirmationStatus::Succeeded
        );
        assert_eq!(
            ConfirmationStatus::from_api("requires_action"),
            ConfirmationStatus::RequiresAction
        );
        assert_eq!(
            ConfirmationStatus::from_api("processing"),
            ConfirmationStatus::RequiresAction
        );
        assert_eq!(
            ConfirmationStatus::from_api("canceled"),
            ConfirmationStatus::Failed
        );
        assert_eq!(
            ConfirmationStatus::from_api("requires_payment_method"),
            ConfirmationStatus::Failed
        );
    }
}
