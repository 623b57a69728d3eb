//! Session-related types.
//!
//! Types stored in the session record: the logged-in identity and, for
//! anonymous visitors, the guest cart itself.

use serde::{Deserialize, Serialize};

use colibri_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Identity-provider subject.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Whether the user may reach the admin surface.
    pub is_admin: bool,
}

/// Session keys.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous visitor's cart line items.
    pub const GUEST_CART: &str = "guest_cart";
}
