use rust_decimal::Decimal;
use tempfile::TempDir;

use storefront_core::domain::product::{NewProduct, Product};

use super::{ProductRepository, SqlProductRepository};
use crate::{connect_with_settings, migrations, DbPool};

/// Single-connection in-memory database with the schema applied.
pub(crate) async fn migrated_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

/// File-backed database shared by `connections` pooled connections, for tests
/// that need writers racing each other.
pub(crate) async fn file_pool(dir: &TempDir, connections: u32) -> DbPool {
    let url = format!("sqlite://{}", dir.path().join("storefront.db").display());
    let pool = connect_with_settings(&url, connections, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

pub(crate) fn new_product(name: &str, category: &str, price: i64, stock: u32) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        description: String::new(),
        price: Decimal::from(price),
        category: category.to_string(),
        stock,
    }
}

pub(crate) async fn insert(
    pool: &DbPool,
    name: &str,
    category: &str,
    price: i64,
    stock: u32,
) -> Product {
    SqlProductRepository::new(pool.clone())
        .create(new_product(name, category, price, stock))
        .await
        .expect("create product")
}
