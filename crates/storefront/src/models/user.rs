//! User model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use colibri_core::{Email, UserId};

/// A store user mirrored from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Identity-provider subject.
    pub id: UserId,
    pub email: Email,
    /// Grants access to the admin surface. Set out-of-band via the CLI.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
