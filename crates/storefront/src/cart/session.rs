//! Cart persistence across the guest and authenticated stores.
//!
//! A cart logically belongs to whoever is browsing: anonymously it lives in
//! the device's session record, after login it lives in the per-user server
//! row. [`CartSession`] picks the active store from the authentication state,
//! applies a mutation through [`CartStore`], and writes the result back after
//! every mutating operation. It is also where the login/logout reconciliation
//! transitions run - the single reconciliation point for the whole app.

use std::collections::HashMap;

use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use colibri_core::{CartLineItem, ProductId, UserId};

use super::reconcile::{clamp_to_catalog, merge_carts};
use super::store::CartStore;
use super::Catalog;
use crate::db::RepositoryError;
use crate::models::session_keys;

/// Errors from cart load/store operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Session (guest store) failure.
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Database (server store or catalog) failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The referenced product is not in the catalog.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),
}

/// Device-scoped cart storage for anonymous browsing.
pub trait GuestCartStore {
    fn load(&self) -> impl Future<Output = Result<Vec<CartLineItem>, CartError>> + Send;
    fn save(&self, items: &[CartLineItem]) -> impl Future<Output = Result<(), CartError>> + Send;
    fn clear(&self) -> impl Future<Output = Result<(), CartError>> + Send;
}

/// Server-side cart storage for authenticated users.
pub trait UserCartStore {
    fn load(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Vec<CartLineItem>, CartError>> + Send;
    fn save(
        &self,
        user: &UserId,
        items: &[CartLineItem],
    ) -> impl Future<Output = Result<(), CartError>> + Send;
    fn delete(&self, user: &UserId) -> impl Future<Output = Result<(), CartError>> + Send;
}

/// Guest cart stored in the tower-sessions record for this device.
#[derive(Clone)]
pub struct SessionGuestCart {
    session: Session,
}

impl SessionGuestCart {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl GuestCartStore for SessionGuestCart {
    async fn load(&self) -> Result<Vec<CartLineItem>, CartError> {
        Ok(self
            .session
            .get::<Vec<CartLineItem>>(session_keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, items: &[CartLineItem]) -> Result<(), CartError> {
        self.session.insert(session_keys::GUEST_CART, items).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.session
            .remove::<Vec<CartLineItem>>(session_keys::GUEST_CART)
            .await?;
        Ok(())
    }
}

/// The per-request cart facade: one loaded cart, one active store.
pub struct CartSession<C, G, U> {
    catalog: C,
    guest: G,
    users: U,
    current_user: Option<UserId>,
}

impl<C, G, U> CartSession<C, G, U>
where
    C: Catalog + Sync,
    G: GuestCartStore + Sync,
    U: UserCartStore + Sync,
{
    /// Create a cart session for the current request.
    pub const fn new(catalog: C, guest: G, users: U, current_user: Option<UserId>) -> Self {
        Self {
            catalog,
            guest,
            users,
            current_user,
        }
    }

    /// Load the cart from the active store.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the active store cannot be read.
    pub async fn load(&self) -> Result<CartStore, CartError> {
        let items = match &self.current_user {
            Some(user) => self.users.load(user).await?,
            None => self.guest.load().await?,
        };
        Ok(CartStore::from_items(items))
    }

    /// Add one unit of a product to the cart and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product is not in the
    /// catalog, or a store error.
    pub async fn add_item(&self, product_id: ProductId) -> Result<CartStore, CartError> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let mut cart = self.load().await?;
        cart.add_item(&product);
        self.persist(&cart).await?;
        Ok(cart)
    }

    /// Set a line's quantity (clamped to stock) and persist.
    ///
    /// A product that has vanished from the catalog is removed from the
    /// cart, matching what reconciliation does with dead references.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a store cannot be read or written.
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartStore, CartError> {
        let mut cart = self.load().await?;
        match self.catalog.product(product_id).await? {
            Some(product) => cart.update_quantity(product_id, quantity, product.stock),
            None => cart.remove_item(product_id),
        }
        self.persist(&cart).await?;
        Ok(cart)
    }

    /// Remove a line and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a store cannot be read or written.
    pub async fn remove_item(&self, product_id: ProductId) -> Result<CartStore, CartError> {
        let mut cart = self.load().await?;
        cart.remove_item(product_id);
        self.persist(&cart).await?;
        Ok(cart)
    }

    /// Empty the cart and persist.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a store cannot be read or written.
    pub async fn clear(&self) -> Result<CartStore, CartError> {
        let mut cart = self.load().await?;
        cart.clear();
        self.persist(&cart).await?;
        Ok(cart)
    }

    /// Login transition: merge the guest cart into the user's server cart.
    ///
    /// Overlaps sum quantities, the result is clamped against current stock
    /// and stripped of dead product references, the server store receives
    /// the merged cart, and the guest store is discarded.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if any involved store cannot be read or written.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn reconcile_login(&self, user: &UserId) -> Result<CartStore, CartError> {
        let server = self.users.load(user).await?;
        let guest = self.guest.load().await?;

        let merged = merge_carts(&guest, &server);
        let ids: Vec<ProductId> = merged.iter().map(|line| line.product_id).collect();
        let catalog: HashMap<ProductId, _> = self
            .catalog
            .products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let reconciled = clamp_to_catalog(merged, &catalog);

        self.users.save(user, &reconciled).await?;
        self.guest.clear().await?;
        Ok(CartStore::from_items(reconciled))
    }

    /// Logout transition: discard the guest store, leave the server cart
    /// untouched for the next login.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the guest store cannot be cleared.
    pub async fn reconcile_logout(&self) -> Result<(), CartError> {
        self.guest.clear().await
    }

    /// Write the cart back to the active store.
    async fn persist(&self, cart: &CartStore) -> Result<(), CartError> {
        match &self.current_user {
            Some(user) => self.users.save(user, cart.items()).await,
            None => self.guest.save(cart.items()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Mutex;

    use colibri_core::Product;

    struct FakeCatalog {
        products: HashMap<ProductId, Product>,
    }

    impl Catalog for &FakeCatalog {
        async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
            Ok(self.products.get(&id).cloned())
        }

        async fn products_by_ids(
            &self,
            ids: &[ProductId],
        ) -> Result<Vec<Product>, RepositoryError> {
            Ok(ids
                .iter()
                .filter_map(|id| self.products.get(id).cloned())
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeGuestStore {
        items: Mutex<Vec<CartLineItem>>,
    }

    impl GuestCartStore for &FakeGuestStore {
        async fn load(&self) -> Result<Vec<CartLineItem>, CartError> {
            Ok(self.items.lock().expect("lock").clone())
        }

        async fn save(&self, items: &[CartLineItem]) -> Result<(), CartError> {
            *self.items.lock().expect("lock") = items.to_vec();
            Ok(())
        }

        async fn clear(&self) -> Result<(), CartError> {
            self.items.lock().expect("lock").clear();
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeUserStore {
        carts: Mutex<HashMap<String, Vec<CartLineItem>>>,
    }

    impl UserCartStore for &FakeUserStore {
        async fn load(&self, user: &UserId) -> Result<Vec<CartLineItem>, CartError> {
            Ok(self
                .carts
                .lock()
                .expect("lock")
                .get(user.as_str())
                .cloned()
                .unwrap_or_default())
        }

        async fn save(&self, user: &UserId, items: &[CartLineItem]) -> Result<(), CartError> {
            self.carts
                .lock()
                .expect("lock")
                .insert(user.as_str().to_owned(), items.to_vec());
            Ok(())
        }

        async fn delete(&self, user: &UserId) -> Result<(), CartError> {
            self.carts.lock().expect("lock").remove(user.as_str());
            Ok(())
        }
    }

    fn product(stock: u32) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Café".to_owned(),
            description: None,
            category: "general".to_owned(),
            price: Decimal::from(1000),
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

    #[tokio::test]
    async fn test_guest_mutations_persist_to_guest_store() {
        let p = product(5);
        let catalog = FakeCatalog {
            products: [(p.id, p.clone())].into(),
        };
        let guest = FakeGuestStore::default();
        let users = FakeUserStore::default();

        let session = CartSession::new(&catalog, &guest, &users, None);
        session.add_item(p.id).await.expect("add");
        session.add_item(p.id).await.expect("add");

        let stored = guest.items.lock().expect("lock").clone();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].quantity, 2);
        assert!(users.carts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_user_mutations_persist_to_server_store() {
        let p = product(5);
        let catalog = FakeCatalog {
            products: [(p.id, p.clone())].into(),
        };
        let guest = FakeGuestStore::default();
        let users = FakeUserStore::default();
        let user = UserId::new("uid-1");

        let session = CartSession::new(&catalog, &guest, &users, Some(user.clone()));
        session.add_item(p.id).await.expect("add");

        let carts = users.carts.lock().expect("lock");
        assert_eq!(carts.get("uid-1").map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_add_unknown_product_fails() {
        let catalog = FakeCatalog {
            products: HashMap::new(),
        };
        let guest = FakeGuestStore::default();
        let users = FakeUserStore::default();

        let session = CartSession::new(&catalog, &guest, &users, None);
        let err = session.add_item(ProductId::generate()).await;
        assert!(matches!(err, Err(CartError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_reconcile_login_merges_clamps_and_clears_guest() {
        // Guest {P1: 2}, server {P1: 1, P2: 1}, P1 stock 2 => {P1: 2, P2: 1}.
        let p1 = product(2);
        let p2 = product(10);
        let catalog = FakeCatalog {
            products: [(p1.id, p1.clone()), (p2.id, p2.clone())].into(),
        };
        let guest = FakeGuestStore::default();
        let users = FakeUserStore::default();
        let user = UserId::new("uid-1");

        *guest.items.lock().expect("lock") = vec![line(&p1, 2)];
        users
            .carts
            .lock()
            .expect("lock")
            .insert("uid-1".to_owned(), vec![line(&p1, 1), line(&p2, 1)]);

        let session = CartSession::new(&catalog, &guest, &users, Some(user.clone()));
        let cart = session.reconcile_login(&user).await.expect("reconcile");

        let by_id: HashMap<ProductId, u32> = cart
            .items()
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect();
        assert_eq!(by_id.get(&p1.id), Some(&2));
        assert_eq!(by_id.get(&p2.id), Some(&1));

        // Guest store discarded, server store holds the merge.
        assert!(guest.items.lock().expect("lock").is_empty());
        let carts = users.carts.lock().expect("lock");
        assert_eq!(carts.get("uid-1").map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_reconcile_logout_keeps_server_cart() {
        let p = product(5);
        let catalog = FakeCatalog {
            products: [(p.id, p.clone())].into(),
        };
        let guest = FakeGuestStore::default();
        let users = FakeUserStore::default();

        *guest.items.lock().expect("lock") = vec![line(&p, 1)];
        users
            .carts
            .lock()
            .expect("lock")
            .insert("uid-1".to_owned(), vec![line(&p, 3)]);

        let session = CartSession::new(&catalog, &guest, &users, None);
        session.reconcile_logout().await.expect("logout");

        assert!(guest.items.lock().expect("lock").is_empty());
        let carts = users.carts.lock().expect("lock");
        assert_eq!(carts.get("uid-1").map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_update_quantity_for_vanished_product_removes_line() {
        let p = product(5);
        let catalog = FakeCatalog {
            products: HashMap::new(),
        };
        let guest = FakeGuestStore::default();
        let users = FakeUserStore::default();
        *guest.items.lock().expect("lock") = vec![line(&p, 2)];

        let session = CartSession::new(&catalog, &guest, &users, None);
        let cart = session.update_quantity(p.id, 4).await.expect("update");
        assert!(cart.is_empty());
    }
}
