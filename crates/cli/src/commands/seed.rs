use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;
use storefront_core::domain::product::NewProduct;
use storefront_db::{migrations, ProductRepository, RepositoryError, SqlProductRepository};

use crate::commands::{
    open_pool, prepare, CommandResult, StepError, EXIT_MIGRATION, EXIT_QUERY,
};

/// name, category, price in cents, stock, description
const DEMO_CATALOG: &[(&str, &str, i64, u32, &str)] = &[
    ("Aurora X1 Smartphone", "Smartphones", 99_900, 25, "Flagship phone with a 6.7\" display"),
    ("Aurora S Smartphone", "Smartphones", 89_900, 40, "Compact sibling of the X1"),
    ("Nimbus Lite Smartphone", "Smartphones", 34_900, 0, "Entry-level phone, restocking soon"),
    ("Rugged Phone Case", "Accessories", 24_900, 120, "Drop-tested case for Aurora phones"),
    ("65W USB-C Charger", "Accessories", 4_900, 300, "GaN fast charger"),
    ("Studio Wireless Headphones", "Audio", 29_900, 35, "Over-ear noise cancelling headphones"),
    ("Pocket Earbuds", "Audio", 12_900, 80, "True wireless earbuds"),
    ("Orbit 14 Laptop", "Laptops", 124_900, 12, "14\" ultrabook"),
    ("Orbit 16 Pro Laptop", "Laptops", 219_900, 6, "16\" workstation laptop"),
    ("Slate 11 Tablet", "Tablets", 59_900, 18, "11\" tablet with stylus support"),
];

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

pub fn demo_catalog() -> Vec<NewProduct> {
    DEMO_CATALOG
        .iter()
        .map(|(name, category, cents, stock, description)| NewProduct {
            name: (*name).to_string(),
            description: (*description).to_string(),
            price: Decimal::new(*cents, 2),
            category: (*category).to_string(),
            stock: *stock,
        })
        .collect()
}

/// Inserts the demo catalog, skipping names that already exist.
pub async fn seed_catalog(
    products: &dyn ProductRepository,
) -> Result<SeedSummary, RepositoryError> {
    let existing: HashSet<String> =
        products.list_all().await?.into_iter().map(|product| product.name).collect();

    let (skipped, missing): (Vec<NewProduct>, Vec<NewProduct>) =
        demo_catalog().into_iter().partition(|product| existing.contains(&product.name));

    let inserted = if missing.is_empty() { 0 } else { products.create_many(missing).await?.len() };
    Ok(SeedSummary { inserted, skipped: skipped.len() })
}

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let summary = seed_catalog(&SqlProductRepository::new(pool.clone()))
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_QUERY))?;
        pool.close().await;
        Ok::<SeedSummary, StepError>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success_with_data(
            "seed",
            format!(
                "demo catalog seeded ({} inserted, {} already present)",
                summary.inserted, summary.skipped
            ),
            summary,
        ),
        Err(step) => CommandResult::from_step("seed", step),
    }
}
