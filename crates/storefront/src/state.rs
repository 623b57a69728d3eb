//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use colibri_core::{CurrencyCode, Email, Product};

use crate::config::StorefrontConfig;
use crate::db::{
    CartRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository,
};
use crate::services::auth::{AuthClient, AuthError};
use crate::services::email::{EmailClient, NotificationError};
use crate::services::payment::{PaymentClient, PaymentError};

/// How long the catalog listing is served from cache.
const CATALOG_CACHE_TTL: Duration = Duration::from_secs(60);

/// Error constructing application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("auth client: {0}")]
    Auth(#[from] AuthError),
    #[error("email client: {0}")]
    Email(#[from] NotificationError),
    #[error("invalid operator email: {0}")]
    OperatorEmail(colibri_core::EmailError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    products: ProductRepository,
    carts: CartRepository,
    users: UserRepository,
    orders: OrderRepository,
    payments: PaymentClient,
    auth: AuthClient,
    mailer: EmailClient,
    operator_email: Email,
    catalog_cache: Cache<(), Arc<Vec<Product>>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if any outbound client fails to build or the
    /// operator email in config does not parse.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = PaymentClient::new(&config.payment)?;
        let auth = AuthClient::new(&config.auth)?;
        let mailer = EmailClient::new(&config.email)?;
        let operator_email =
            Email::parse(&config.email.operator).map_err(StateError::OperatorEmail)?;

        let catalog_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(CATALOG_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                products: ProductRepository::new(pool.clone()),
                carts: CartRepository::new(pool.clone()),
                users: UserRepository::new(pool.clone()),
                orders: OrderRepository::new(pool.clone()),
                payments,
                auth,
                mailer,
                operator_email,
                catalog_cache,
                config,
                pool,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the product repository.
    #[must_use]
    pub fn products(&self) -> &ProductRepository {
        &self.inner.products
    }

    /// Get a reference to the cart repository.
    #[must_use]
    pub fn carts(&self) -> &CartRepository {
        &self.inner.carts
    }

    /// Get a reference to the user repository.
    #[must_use]
    pub fn users(&self) -> &UserRepository {
        &self.inner.users
    }

    /// Get a reference to the order repository.
    #[must_use]
    pub fn orders(&self) -> &OrderRepository {
        &self.inner.orders
    }

    /// Get a reference to the payment client.
    #[must_use]
    pub fn payments(&self) -> &PaymentClient {
        &self.inner.payments
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    /// Get a reference to the email client.
    #[must_use]
    pub fn mailer(&self) -> &EmailClient {
        &self.inner.mailer
    }

    /// The operator address for new-order notifications.
    #[must_use]
    pub fn operator_email(&self) -> &Email {
        &self.inner.operator_email
    }

    /// The store's currency.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.config.currency
    }

    /// List the catalog, served from a short-lived cache.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the underlying query fails on a cache
    /// miss.
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(cached) = self.inner.catalog_cache.get(&()).await {
            return Ok(cached);
        }
        let products = Arc::new(self.inner.products.list().await?);
        self.inner
            .catalog_cache
            .insert((), Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// Drop the catalog cache after an admin mutation.
    pub async fn invalidate_catalog(&self) {
        self.inner.catalog_cache.invalidate(&()).await;
    }
}
