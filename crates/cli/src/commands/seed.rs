//! Catalog seeding for local development.

use rust_decimal::Decimal;
use thiserror::Error;

use colibri_storefront::db::products::NewProduct;
use colibri_storefront::db::{self, ProductRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("{0}")]
    MissingEnvVar(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Insert demo products into an empty catalog.
///
/// Refuses to run against a catalog that already has products, so a stray
/// invocation cannot duplicate the demo data.
///
/// # Errors
///
/// Returns `SeedError` if the database is unreachable or an insert fails.
pub async fn products() -> Result<(), SeedError> {
    let database_url = super::database_url().map_err(SeedError::MissingEnvVar)?;
    let pool = db::create_pool(&database_url).await?;
    let repository = ProductRepository::new(pool);

    let existing = repository.list().await?;
    if !existing.is_empty() {
        tracing::warn!(
            count = existing.len(),
            "Catalog already has products, skipping seed"
        );
        return Ok(());
    }

    let demo = demo_products();
    let total = demo.len();
    for product in demo {
        let name = product.name.clone();
        let created = repository.create(product).await?;
        tracing::info!(%created.id, name, "Seeded product");
    }

    tracing::info!(total, "Catalog seeded");
    Ok(())
}

fn demo_products() -> Vec<NewProduct> {
    vec![
        NewProduct {
            name: "Chorotega Pour-Over Kit".to_string(),
            description: Some(
                "Hand-thrown ceramic dripper with a matching carafe. Each piece is \
                 glazed individually, so no two kits look quite alike."
                    .to_string(),
            ),
            category: "brewing".to_string(),
            price: Decimal::new(24_500, 0),
            stock: 12,
            images: vec!["/img/products/pour-over-kit.jpg".to_string()],
        },
        NewProduct {
            name: "Tarrazu Single Origin, 340g".to_string(),
            description: Some(
                "Washed arabica from the Tarrazu valley, roasted to order. Notes of \
                 chocolate, red apple, and cane sugar."
                    .to_string(),
            ),
            category: "coffee".to_string(),
            price: Decimal::new(8_900, 0),
            stock: 60,
            images: vec!["/img/products/tarrazu-340.jpg".to_string()],
        },
        NewProduct {
            name: "Monteverde Blend, 1kg".to_string(),
            description: Some("House espresso blend for milk drinks.".to_string()),
            category: "coffee".to_string(),
            price: Decimal::new(18_500, 0),
            stock: 35,
            images: vec!["/img/products/monteverde-1kg.jpg".to_string()],
        },
        NewProduct {
            name: "Travel Tumbler, 350ml".to_string(),
            description: None,
            category: "accessories".to_string(),
            price: Decimal::new(12_000, 0),
            stock: 48,
            images: vec!["/img/products/tumbler-350.jpg".to_string()],
        },
        NewProduct {
            name: "Burr Grinder Mini".to_string(),
            description: Some(
                "Compact conical burr grinder with 18 grind settings.".to_string(),
            ),
            category: "brewing".to_string(),
            price: Decimal::new(36_000, 0),
            stock: 8,
            images: vec!["/img/products/burr-grinder.jpg".to_string()],
        },
    ]
}
