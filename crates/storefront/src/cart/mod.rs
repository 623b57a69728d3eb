//! Cart core: line-item bookkeeping, guest/server persistence, and the
//! login-time reconciliation between the two.
//!
//! The cart itself is plain in-memory state ([`store::CartStore`]); which
//! store it is written back to depends on the authentication state and is
//! handled by [`session::CartSession`].

pub mod reconcile;
pub mod session;
pub mod store;

pub use session::{CartSession, GuestCartStore, UserCartStore};
pub use store::CartStore;

use colibri_core::{Product, ProductId};

use crate::db::RepositoryError;

/// Read-only catalog access as the cart and checkout core consume it.
///
/// Implemented by the product repository in production and by in-memory
/// fakes in tests.
pub trait Catalog {
    /// Look up a single product; `None` means it no longer exists.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Batch lookup. IDs that no longer exist are absent from the result.
    fn products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;
}
