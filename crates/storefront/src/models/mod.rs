//! Domain models owned by the storefront (as opposed to the shared types in
//! `colibri-core`): the identity-mirror user and what lives in the session.

pub mod session;
pub mod user;

pub use session::{session_keys, CurrentUser};
pub use user::User;
