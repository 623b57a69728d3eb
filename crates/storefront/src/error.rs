//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Responses are JSON of the shape `{"error": "..."}`; insufficient-stock
//! responses additionally itemize the shortages so the client can fix the
//! cart line by line.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cart::session::CartError;
use crate::checkout::CheckoutError;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout step failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Token verification failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_),
            ) => true,
            Self::Internal(_) => true,
            Self::Cart(CartError::Session(_) | CartError::Repository(_)) => true,
            Self::Checkout(
                CheckoutError::Persistence(_) | CheckoutError::OrderPersistence { .. },
            ) => true,
            Self::Auth(AuthError::Http(_) | AuthError::Api { .. }) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, body) = match &self {
            Self::Database(RepositoryError::Conflict(msg)) => {
                (StatusCode::CONFLICT, json!({ "error": msg }))
            }
            Self::Database(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, json!({ "error": "not found" }))
            }
            Self::Database(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
            Self::Cart(err) => match err {
                CartError::ProductNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    json!({ "error": format!("product not found: {id}") }),
                ),
                CartError::Session(_) | CartError::Repository(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                ),
            },
            Self::Checkout(err) => match err {
                CheckoutError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, json!({ "error": msg }))
                }
                CheckoutError::InsufficientStock(shortages) => (
                    StatusCode::CONFLICT,
                    json!({
                        "error": "insufficient stock",
                        "shortages": shortages,
                    }),
                ),
                CheckoutError::Payment(_) | CheckoutError::PaymentNotSucceeded(_) => (
                    StatusCode::PAYMENT_REQUIRED,
                    json!({ "error": err.to_string() }),
                ),
                CheckoutError::AmountMismatch { .. } | CheckoutError::CurrencyMismatch { .. } => {
                    (StatusCode::CONFLICT, json!({ "error": err.to_string() }))
                }
                CheckoutError::Persistence(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                ),
                // The buyer was charged; the reference must reach them so
                // support can find the payment.
                CheckoutError::OrderPersistence { reference, .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": format!(
                            "your payment {reference} was received but the order could not \
                             be recorded; contact support and quote this reference"
                        ),
                    }),
                ),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    json!({ "error": "invalid or expired ID token" }),
                ),
                AuthError::MissingEmail | AuthError::Email(_) => {
                    (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
                }
                AuthError::Http(_) | AuthError::Api { .. } => (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "identity provider unavailable" }),
                ),
            },
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("not found: {what}") }),
            ),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use colibri_core::ProductId;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_error_status_codes() {
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::Validation(
                "cart is empty".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InsufficientStock(
                Vec::new()
            ))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_unknown_product_maps_to_not_found() {
        assert_eq!(
            get_status(AppError::Cart(CartError::ProductNotFound(
                ProductId::generate()
            ))),
            StatusCode::NOT_FOUND
        );
    }
}
