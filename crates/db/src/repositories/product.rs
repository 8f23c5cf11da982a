use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use storefront_core::domain::product::{NewProduct, Product, ProductId};

use super::{
    begin_write, decode_error, format_timestamp, is_unique_violation, parse_timestamp, store_now,
    ProductRepository, RepositoryError,
};
use crate::DbPool;

pub(crate) const PRODUCT_COLUMNS: &str = "p.id AS id, p.name AS name, p.description AS description,
            p.price AS price, p.category AS category, p.stock AS stock,
            p.created_at AS created_at, p.updated_at AS updated_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let description: String = row.try_get("description").map_err(decode_error)?;
    let price: String = row.try_get("price").map_err(decode_error)?;
    let category: String = row.try_get("category").map_err(decode_error)?;
    let stock: i64 = row.try_get("stock").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Product {
        id: ProductId(id),
        name,
        description,
        price: parse_price(&price)?,
        category,
        stock: u32::try_from(stock)
            .map_err(|_| RepositoryError::Decode(format!("stock `{stock}` out of range")))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn parse_price(value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("price `{value}`: {error}")))
}

pub(crate) async fn fetch_product(
    conn: &mut SqliteConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = ?"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_product).transpose()
}

/// Fails with `Conflict` when another product already uses `name`.
async fn ensure_name_available(
    conn: &mut SqliteConnection,
    name: &str,
    except: Option<ProductId>,
) -> Result<(), RepositoryError> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM product WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) if Some(ProductId(id)) != except => {
            Err(RepositoryError::Conflict(format!("product name `{name}` is already in use")))
        }
        _ => Ok(()),
    }
}

async fn insert_product(
    conn: &mut SqliteConnection,
    product: NewProduct,
) -> Result<Product, RepositoryError> {
    product.validate()?;
    let name = product.name.trim().to_string();
    let category = product.category.trim().to_string();
    ensure_name_available(conn, &name, None).await?;

    let now = store_now();
    let result = sqlx::query(
        "INSERT INTO product (name, description, price, category, stock, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(&product.description)
    .bind(product.price.to_string())
    .bind(&category)
    .bind(i64::from(product.stock))
    .bind(format_timestamp(now))
    .bind(format_timestamp(now))
    .execute(&mut *conn)
    .await
    .map_err(|error| unique_name_conflict(error, &name))?;

    Ok(Product {
        id: ProductId(result.last_insert_rowid()),
        name,
        description: product.description,
        price: product.price,
        category,
        stock: product.stock,
        created_at: now,
        updated_at: now,
    })
}

fn unique_name_conflict(error: sqlx::Error, name: &str) -> RepositoryError {
    if is_unique_violation(&error) {
        RepositoryError::Conflict(format!("product name `{name}` is already in use"))
    } else {
        RepositoryError::Database(error)
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = begin_write(&mut conn).await?;
        let created = insert_product(&mut tx, product).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn create_many(
        &self,
        products: Vec<NewProduct>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = begin_write(&mut conn).await?;
        let mut created = Vec::with_capacity(products.len());
        for product in products {
            created.push(insert_product(&mut tx, product).await?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product p ORDER BY p.id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn list_by_category(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.stock > 0 AND p.category = "
        ));
        builder.push_bind(category);
        push_exclusion(&mut builder, exclude);
        builder.push(" ORDER BY p.id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn update(&self, product: Product) -> Result<Product, RepositoryError> {
        NewProduct {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            stock: product.stock,
        }
        .validate()?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = begin_write(&mut conn).await?;
        let Some(current) = fetch_product(&mut tx, product.id).await? else {
            return Err(RepositoryError::product_not_found(product.id));
        };

        let name = product.name.trim().to_string();
        let category = product.category.trim().to_string();
        ensure_name_available(&mut tx, &name, Some(product.id)).await?;

        let now = store_now();
        sqlx::query(
            "UPDATE product
             SET name = ?, description = ?, price = ?, category = ?, stock = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&name)
        .bind(&product.description)
        .bind(product.price.to_string())
        .bind(&category)
        .bind(i64::from(product.stock))
        .bind(format_timestamp(now))
        .bind(product.id.0)
        .execute(&mut *tx)
        .await
        .map_err(|error| unique_name_conflict(error, &name))?;
        tx.commit().await?;

        Ok(Product { name, category, created_at: current.created_at, updated_at: now, ..product })
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(id.0).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::product_not_found(id));
        }
        Ok(())
    }
}

/// Appends ` AND p.id NOT IN (...)` when there is anything to exclude.
pub(crate) fn push_exclusion(builder: &mut QueryBuilder<'_, Sqlite>, exclude: &[ProductId]) {
    if exclude.is_empty() {
        return;
    }

    builder.push(" AND p.id NOT IN ");
    push_id_set(builder, exclude);
}

/// Appends `(SELECT value FROM json_each(?))` with `ids` bound as a single JSON
/// array, keeping any id list within SQLite's bind-parameter limit.
pub(crate) fn push_id_set(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[ProductId]) {
    let array = serde_json::Value::from(ids.iter().map(|id| id.0).collect::<Vec<_>>());
    builder.push("(SELECT value FROM json_each(");
    builder.push_bind(array.to_string());
    builder.push("))");
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use storefront_core::domain::product::{NewProduct, Product, ProductId};

    use super::SqlProductRepository;
    use crate::repositories::{ProductRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn new_product(name: &str, category: &str, price: i64, stock: u32) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            price: Decimal::from(price),
            category: category.to_string(),
            stock,
        }
    }

    #[tokio::test]
    async fn create_and_find_by_id() {
        let repo = SqlProductRepository::new(setup().await);

        let created =
            repo.create(new_product("iPhone 13", "Smartphones", 999, 50)).await.expect("create");
        let found = repo.find_by_id(created.id).await.expect("find").expect("product exists");

        assert_eq!(found, created);
        assert_eq!(found.price, Decimal::from(999));
    }

    #[tokio::test]
    async fn decimal_prices_survive_storage() {
        let repo = SqlProductRepository::new(setup().await);
        let product =
            NewProduct { price: Decimal::new(1_999, 2), ..new_product("Cable", "Acc", 0, 1) };

        let created = repo.create(product).await.expect("create");
        let found = repo.find_by_id(created.id).await.expect("find").expect("product exists");

        assert_eq!(found.price, Decimal::new(1_999, 2));
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let repo = SqlProductRepository::new(setup().await);
        repo.create(new_product("Pixel 8", "Smartphones", 699, 3)).await.expect("create");

        let result = repo.create(new_product("Pixel 8", "Smartphones", 799, 1)).await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn negative_price_is_rejected_before_insert() {
        let repo = SqlProductRepository::new(setup().await);

        let result = repo.create(new_product("Broken", "Misc", -5, 1)).await;

        assert!(matches!(result, Err(RepositoryError::Invalid(_))));
        assert!(repo.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn create_many_is_all_or_nothing() {
        let repo = SqlProductRepository::new(setup().await);

        let result = repo
            .create_many(vec![
                new_product("Galaxy S23", "Smartphones", 899, 5),
                new_product("Galaxy Buds", "Accessories", 149, 5),
                new_product("Galaxy S23", "Smartphones", 899, 5),
            ])
            .await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(repo.list_all().await.expect("list").is_empty());

        let created = repo
            .create_many(vec![
                new_product("Galaxy S23", "Smartphones", 899, 5),
                new_product("Galaxy Buds", "Accessories", 149, 5),
            ])
            .await
            .expect("batch insert");
        assert_eq!(created.len(), 2);
    }

    #[tokio::test]
    async fn list_by_category_filters_stock_and_exclusions() {
        let repo = SqlProductRepository::new(setup().await);
        let a = repo.create(new_product("A", "Smartphones", 999, 5)).await.expect("a");
        let b = repo.create(new_product("B", "Smartphones", 899, 5)).await.expect("b");
        repo.create(new_product("Sold out", "Smartphones", 799, 0)).await.expect("sold out");
        repo.create(new_product("Case", "Accessories", 49, 5)).await.expect("case");

        let listed = repo.list_by_category("Smartphones", &[a.id]).await.expect("list");

        assert_eq!(listed.iter().map(|product| product.id).collect::<Vec<_>>(), vec![b.id]);
    }

    #[tokio::test]
    async fn update_renames_and_keeps_uniqueness() {
        let repo = SqlProductRepository::new(setup().await);
        let first = repo.create(new_product("Old name", "Misc", 10, 1)).await.expect("first");
        repo.create(new_product("Taken", "Misc", 10, 1)).await.expect("second");

        let renamed = repo.update(renamed_product(&first, "New name")).await.expect("rename");
        assert_eq!(renamed.name, "New name");
        assert_eq!(renamed.created_at, first.created_at);

        let clash = repo.update(renamed_product(&first, "Taken")).await;
        assert!(matches!(clash, Err(RepositoryError::Conflict(_))));

        let same_name = repo.update(renamed_product(&renamed, "New name")).await;
        assert!(same_name.is_ok(), "keeping its own name is not a conflict");
    }

    #[tokio::test]
    async fn update_and_delete_missing_products_are_not_found() {
        let repo = SqlProductRepository::new(setup().await);
        let product = repo.create(new_product("Ghost", "Misc", 1, 1)).await.expect("create");
        repo.delete(product.id).await.expect("delete");

        assert!(matches!(
            repo.delete(product.id).await,
            Err(RepositoryError::NotFound { entity: "product", .. })
        ));
        assert!(matches!(
            repo.update(product.clone()).await,
            Err(RepositoryError::NotFound { entity: "product", .. })
        ));
        assert_eq!(repo.find_by_id(ProductId(product.id.0)).await.expect("find"), None);
    }

    fn renamed_product(product: &Product, name: &str) -> Product {
        Product { name: name.to_string(), ..product.clone() }
    }
}
