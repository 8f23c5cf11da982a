use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use storefront_core::domain::product::ProductId;
use storefront_core::domain::trending::{TrendingCounter, TrendingEntry};

use super::product::{row_to_product, PRODUCT_COLUMNS};
use super::{
    decode_error, format_timestamp, is_foreign_key_violation, store_now, RepositoryError,
    TrendingRepository,
};
use crate::DbPool;

pub struct SqlTrendingRepository {
    pool: DbPool,
}

impl SqlTrendingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Inserts the counter at 1 or increments it in a single statement, so
/// concurrent bumps for one product serialize on the primary key.
pub(crate) async fn upsert_counter(
    conn: &mut SqliteConnection,
    product_id: ProductId,
    title: &str,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO trending_product (product_id, title, view_count, updated_at)
         VALUES (?, ?, 1, ?)
         ON CONFLICT(product_id) DO UPDATE SET
             view_count = trending_product.view_count + 1,
             title = excluded.title,
             updated_at = excluded.updated_at",
    )
    .bind(product_id.0)
    .bind(title)
    .bind(format_timestamp(now))
    .execute(&mut *conn)
    .await
    .map_err(|error| {
        if is_foreign_key_violation(&error) {
            RepositoryError::product_not_found(product_id)
        } else {
            RepositoryError::Database(error)
        }
    })?;

    Ok(())
}

pub(crate) fn view_count_from(row: &SqliteRow) -> Result<u64, RepositoryError> {
    let count: i64 = row.try_get("view_count").map_err(decode_error)?;
    u64::try_from(count)
        .map_err(|_| RepositoryError::Decode(format!("view_count `{count}` is negative")))
}

fn row_to_entry(row: &SqliteRow) -> Result<TrendingEntry, RepositoryError> {
    Ok(TrendingEntry {
        product: row_to_product(row)?.view(),
        display_title: row.try_get("display_title").map_err(decode_error)?,
        view_count: view_count_from(row)?,
    })
}

#[async_trait::async_trait]
impl TrendingRepository for SqlTrendingRepository {
    async fn bump_view(&self, product_id: ProductId, title: &str) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_counter(&mut conn, product_id, title, store_now()).await
    }

    async fn top_trending(
        &self,
        limit: usize,
        in_stock_only: bool,
    ) -> Result<Vec<TrendingEntry>, RepositoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let stock_filter = if in_stock_only { "WHERE p.stock > 0" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS},
                    COALESCE(t.title, p.name) AS display_title,
                    COALESCE(t.view_count, 0) AS view_count
             FROM product p
             LEFT JOIN trending_product t ON t.product_id = p.id
             {stock_filter}
             ORDER BY view_count DESC, p.created_at DESC, p.id DESC
             LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn counter(
        &self,
        product_id: ProductId,
    ) -> Result<Option<TrendingCounter>, RepositoryError> {
        let row = sqlx::query(
            "SELECT product_id, title, view_count FROM trending_product WHERE product_id = ?",
        )
        .bind(product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(TrendingCounter {
                product_id: ProductId(row.try_get("product_id").map_err(decode_error)?),
                display_title: row.try_get("title").map_err(decode_error)?,
                view_count: view_count_from(&row)?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storefront_core::domain::product::ProductId;
    use tempfile::TempDir;

    use super::SqlTrendingRepository;
    use crate::repositories::test_support::{file_pool, insert, migrated_pool};
    use crate::repositories::{RepositoryError, TrendingRepository};

    #[tokio::test]
    async fn repeated_bumps_count_and_refresh_title() {
        let pool = migrated_pool().await;
        let product = insert(&pool, "Desk Lamp", "home", 40, 3).await;
        let repo = SqlTrendingRepository::new(pool);

        repo.bump_view(product.id, "Desk Lamp").await.expect("bump");
        repo.bump_view(product.id, "Desk Lamp").await.expect("bump");
        repo.bump_view(product.id, "Desk Lamp Pro").await.expect("bump");

        let counter = repo.counter(product.id).await.expect("counter").expect("row");
        assert_eq!(counter.view_count, 3);
        assert_eq!(counter.display_title, "Desk Lamp Pro");

        let top = repo.top_trending(1, true).await.expect("top");
        assert_eq!(top[0].view_count, 3);
        assert_eq!(top[0].display_title, "Desk Lamp Pro");
    }

    #[tokio::test]
    async fn out_of_stock_products_never_trend_when_filtered() {
        let pool = migrated_pool().await;
        let sold_out = insert(&pool, "D", "toys", 10, 0).await;
        let available = insert(&pool, "E", "toys", 10, 10).await;
        let repo = SqlTrendingRepository::new(pool);

        for _ in 0..5 {
            repo.bump_view(sold_out.id, "D").await.expect("bump");
        }
        repo.bump_view(available.id, "E").await.expect("bump");

        let filtered = repo.top_trending(2, true).await.expect("top");
        let ids: Vec<_> = filtered.iter().map(|entry| entry.product.id).collect();
        assert_eq!(ids, vec![available.id]);

        let unfiltered = repo.top_trending(2, false).await.expect("top");
        let ids: Vec<_> = unfiltered.iter().map(|entry| entry.product.id).collect();
        assert_eq!(ids, vec![sold_out.id, available.id]);
    }

    #[tokio::test]
    async fn never_viewed_products_rank_last_newest_first() {
        let pool = migrated_pool().await;
        let older = insert(&pool, "Older", "books", 12, 1).await;
        let newer = insert(&pool, "Newer", "books", 12, 1).await;
        let viewed = insert(&pool, "Viewed", "books", 12, 1).await;
        let repo = SqlTrendingRepository::new(pool);
        repo.bump_view(viewed.id, "Viewed").await.expect("bump");

        let top = repo.top_trending(10, true).await.expect("top");
        let ids: Vec<_> = top.iter().map(|entry| entry.product.id).collect();
        assert_eq!(ids, vec![viewed.id, newer.id, older.id]);
        assert_eq!(top[1].view_count, 0);
        assert_eq!(top[1].display_title, "Newer");
    }

    #[tokio::test]
    async fn bumping_an_unknown_product_is_not_found() {
        let repo = SqlTrendingRepository::new(migrated_pool().await);

        assert!(matches!(
            repo.bump_view(ProductId(404), "ghost").await,
            Err(RepositoryError::NotFound { entity: "product", .. })
        ));
        assert!(repo.counter(ProductId(404)).await.expect("counter").is_none());
        assert!(repo.top_trending(0, true).await.expect("top").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bumps_serialize_on_the_counter() {
        let dir = TempDir::new().expect("temp dir");
        let pool = file_pool(&dir, 6).await;
        let product_id = insert(&pool, "Desk Lamp", "home", 40, 3).await.id;
        let repo = Arc::new(SqlTrendingRepository::new(pool));

        let bumps: Vec<_> = (0..40)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.bump_view(product_id, "Desk Lamp").await })
            })
            .collect();
        for bump in bumps {
            bump.await.expect("join").expect("bump");
        }

        let counter = repo.counter(product_id).await.expect("counter").expect("row");
        assert_eq!(counter.view_count, 40);
    }
}
