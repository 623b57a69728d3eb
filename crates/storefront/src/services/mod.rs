//! Outbound service clients.
//!
//! Each collaborator gets a small typed client over `reqwest`: card payments,
//! identity token verification, and transactional email. Clients are cheap to
//! clone (shared inner state behind an `Arc`) and are constructed once at
//! startup from their config sections.

pub mod auth;
pub mod email;
pub mod payment;

pub use auth::{AuthClient, AuthError, VerifiedIdentity};
pub use email::{EmailClient, NotificationError};
pub use payment::{
    ConfirmationStatus, PaymentAuthorization, PaymentClient, PaymentConfirmation, PaymentError,
};
