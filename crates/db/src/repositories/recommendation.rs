use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use storefront_core::domain::interaction::{Actor, ActorKind, CoView};
use storefront_core::domain::product::{Product, ProductId};
use storefront_core::domain::recommendation::Candidate;
use storefront_core::errors::ApplicationError;
use storefront_core::recommend::RecommendationSource;

use super::product::{
    fetch_product, push_exclusion, push_id_set, row_to_product, PRODUCT_COLUMNS,
};
use super::trending::view_count_from;
use super::{decode_error, RepositoryError};
use crate::DbPool;

/// Reads the catalog, interaction and trending tables for the recommendation engine.
#[derive(Clone)]
pub struct SqlRecommendationSource {
    pool: DbPool,
}

impl SqlRecommendationSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_candidates(
        &self,
        mut builder: QueryBuilder<'_, Sqlite>,
    ) -> Result<Vec<Candidate>, RepositoryError> {
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_candidate).collect()
    }

    async fn fetch_co_views(&self, seed: ProductId) -> Result<Vec<CoView>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT 'user' AS actor_kind, CAST(other.user_id AS TEXT) AS actor_id,
                    other.product_id AS product_id
             FROM user_interaction seed
             JOIN user_interaction other ON other.user_id = seed.user_id
             WHERE seed.product_id = ? AND other.product_id <> ?
             UNION
             SELECT 'guest', other.guest_id, other.product_id
             FROM guest_interaction seed
             JOIN guest_interaction other ON other.guest_id = seed.guest_id
             WHERE seed.product_id = ? AND other.product_id <> ?",
        )
        .bind(seed.0)
        .bind(seed.0)
        .bind(seed.0)
        .bind(seed.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_co_view).collect()
    }
}

/// Candidate rows carry the trending count, zero for never-viewed products.
fn candidate_query(filter: &str) -> QueryBuilder<'static, Sqlite> {
    QueryBuilder::new(format!(
        "SELECT {PRODUCT_COLUMNS}, COALESCE(t.view_count, 0) AS view_count
         FROM product p
         LEFT JOIN trending_product t ON t.product_id = p.id
         WHERE {filter}"
    ))
}

fn push_limit(builder: &mut QueryBuilder<'_, Sqlite>, limit: usize) {
    builder.push(" LIMIT ");
    builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
}

fn row_to_candidate(row: &SqliteRow) -> Result<Candidate, RepositoryError> {
    Ok(Candidate { product: row_to_product(row)?, view_count: view_count_from(row)? })
}

fn row_to_co_view(row: &SqliteRow) -> Result<CoView, RepositoryError> {
    let kind: String = row.try_get("actor_kind").map_err(decode_error)?;
    let actor_id: String = row.try_get("actor_id").map_err(decode_error)?;
    let product_id: i64 = row.try_get("product_id").map_err(decode_error)?;

    let kind = ActorKind::parse(&kind)
        .ok_or_else(|| RepositoryError::Decode(format!("actor kind `{kind}`")))?;
    let actor = Actor::from_parts(kind, &actor_id)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(CoView { actor, product_id: ProductId(product_id) })
}

#[async_trait]
impl RecommendationSource for SqlRecommendationSource {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, ApplicationError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        Ok(fetch_product(&mut conn, id).await?)
    }

    async fn co_views(&self, seed: ProductId) -> Result<Vec<CoView>, ApplicationError> {
        Ok(self.fetch_co_views(seed).await?)
    }

    async fn candidates_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = candidate_query("p.id IN ");
        push_id_set(&mut builder, ids);
        builder.push(" ORDER BY p.id");

        Ok(self.fetch_candidates(builder).await?)
    }

    async fn category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let mut builder = candidate_query("p.stock > 0 AND p.category = ");
        builder.push_bind(category.to_string());
        push_exclusion(&mut builder, exclude);
        builder.push(" ORDER BY p.id");

        Ok(self.fetch_candidates(builder).await?)
    }

    async fn cross_category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let mut builder = candidate_query("p.stock > 0 AND p.category <> ");
        builder.push_bind(category.to_string());
        push_exclusion(&mut builder, exclude);
        builder.push(" ORDER BY p.id");

        Ok(self.fetch_candidates(builder).await?)
    }

    async fn popular_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder = candidate_query("p.stock > 0 AND COALESCE(t.view_count, 0) > 0");
        push_exclusion(&mut builder, exclude);
        builder.push(" ORDER BY view_count DESC, p.created_at DESC, p.id ASC");
        push_limit(&mut builder, limit);

        Ok(self.fetch_candidates(builder).await?)
    }

    async fn newest_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder = candidate_query("p.stock > 0");
        push_exclusion(&mut builder, exclude);
        builder.push(" ORDER BY p.created_at DESC, p.id ASC");
        push_limit(&mut builder, limit);

        Ok(self.fetch_candidates(builder).await?)
    }
}

#[cfg(test)]
mod tests {
    use storefront_core::domain::interaction::{Actor, GuestId};
    use storefront_core::domain::product::{Product, ProductId};
    use storefront_core::domain::recommendation::RecommendationTier;
    use storefront_core::errors::{ApplicationError, DomainError};
    use storefront_core::recommend::{
        RecommendationEngine, RecommendationPolicy, RecommendationSource,
    };

    use super::SqlRecommendationSource;
    use crate::repositories::test_support::{insert, migrated_pool};
    use crate::repositories::{
        InteractionRepository, SessionRepository, SqlInteractionRepository, SqlSessionRepository,
    };
    use crate::DbPool;

    struct Catalog {
        phone_a: Product,
        phone_b: Product,
        case_c: Product,
    }

    async fn smartphone_catalog(pool: &DbPool) -> Catalog {
        Catalog {
            phone_a: insert(pool, "Phone A", "Smartphones", 999, 5).await,
            phone_b: insert(pool, "Phone B", "Smartphones", 899, 5).await,
            case_c: insert(pool, "Case C", "Accessories", 249, 5).await,
        }
    }

    fn engine(pool: &DbPool) -> RecommendationEngine<SqlRecommendationSource> {
        RecommendationEngine::new(
            SqlRecommendationSource::new(pool.clone()),
            RecommendationPolicy::default(),
        )
    }

    fn ids(recommendations: &[storefront_core::Recommendation]) -> Vec<ProductId> {
        recommendations.iter().map(|recommendation| recommendation.product.id).collect()
    }

    #[tokio::test]
    async fn co_viewers_of_the_seed_drive_collaborative_picks() {
        let pool = migrated_pool().await;
        let catalog = smartphone_catalog(&pool).await;
        insert(&pool, "Unrelated", "Garden", 15, 5).await;
        let sessions = SqlSessionRepository::new(pool.clone());
        let u1 = Actor::User(sessions.create_user("u1@example.com", "customer").await.expect("u1"));
        let u2 = Actor::User(sessions.create_user("u2@example.com", "customer").await.expect("u2"));
        let recorder = SqlInteractionRepository::new(pool.clone());
        for (actor, product) in [
            (&u1, &catalog.phone_a),
            (&u1, &catalog.case_c),
            (&u2, &catalog.phone_a),
            (&u2, &catalog.phone_b),
        ] {
            recorder.record_view(actor, product.id).await.expect("record");
        }

        let picks = engine(&pool)
            .recommend_collaborative(catalog.phone_a.id, 5)
            .await
            .expect("collaborative");

        assert_eq!(ids(&picks), vec![catalog.phone_b.id, catalog.case_c.id]);
        assert!(picks.iter().all(|pick| pick.tier == RecommendationTier::Collaborative));
        assert!(picks.iter().all(|pick| pick.relevance_score == 1.0));
    }

    #[tokio::test]
    async fn same_category_outranks_other_categories() {
        let pool = migrated_pool().await;
        let catalog = smartphone_catalog(&pool).await;

        let picks =
            engine(&pool).recommend_by_category(catalog.phone_a.id, 5).await.expect("category");

        assert_eq!(ids(&picks), vec![catalog.phone_b.id]);
        assert_eq!(picks[0].relevance_score, 70.0);
    }

    #[tokio::test]
    async fn guest_and_user_co_views_are_merged_and_distinct() {
        let pool = migrated_pool().await;
        let catalog = smartphone_catalog(&pool).await;
        let guest = Actor::Guest(GuestId::new("guest_a").expect("guest"));
        let recorder = SqlInteractionRepository::new(pool.clone());
        for product in [&catalog.phone_a, &catalog.case_c, &catalog.case_c, &catalog.phone_a] {
            recorder.record_view(&guest, product.id).await.expect("record");
        }

        let co_views = SqlRecommendationSource::new(pool)
            .co_views(catalog.phone_a.id)
            .await
            .expect("co views");

        assert_eq!(co_views.len(), 1);
        assert_eq!(co_views[0].actor, guest);
        assert_eq!(co_views[0].product_id, catalog.case_c.id);
    }

    #[tokio::test]
    async fn fresh_store_still_fills_from_fallback_tiers() {
        let pool = migrated_pool().await;
        let seed = insert(&pool, "Lonely", "Solo", 100, 5).await;
        for index in 0..6 {
            insert(&pool, &format!("Filler {index}"), &format!("Cat {index}"), 2_000, 1).await;
        }
        insert(&pool, "Sold Out", "Cat X", 100, 0).await;

        let picks = engine(&pool).recommend(seed.id, 5).await.expect("recommend");

        assert_eq!(picks.len(), 5);
        assert!(picks.iter().all(|pick| pick.product.id != seed.id && pick.product.stock > 0));
        assert!(picks.iter().all(|pick| pick.tier == RecommendationTier::Newest));
    }

    #[tokio::test]
    async fn popular_candidates_need_views_and_stock() {
        let pool = migrated_pool().await;
        let catalog = smartphone_catalog(&pool).await;
        let sold_out = insert(&pool, "Sold Out", "Smartphones", 950, 0).await;
        let guest = Actor::Guest(GuestId::new("guest_b").expect("guest"));
        let recorder = SqlInteractionRepository::new(pool.clone());
        for product in [&catalog.case_c, &catalog.case_c, &catalog.phone_b, &sold_out] {
            recorder.record_view(&guest, product.id).await.expect("record");
        }
        let source = SqlRecommendationSource::new(pool);

        let popular = source.popular_candidates(&[catalog.phone_b.id], 10).await.expect("popular");

        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].product.id, catalog.case_c.id);
        assert_eq!(popular[0].view_count, 2);
    }

    #[tokio::test]
    async fn unknown_seed_is_not_found() {
        let pool = migrated_pool().await;

        let result = engine(&pool).recommend(ProductId(31337), 5).await;

        assert_eq!(
            result.map(|picks| picks.len()),
            Err(ApplicationError::Domain(DomainError::ProductNotFound(ProductId(31337))))
        );
    }

    #[tokio::test]
    async fn id_lists_beyond_the_bind_limit_still_filter() {
        let pool = migrated_pool().await;
        let catalog = smartphone_catalog(&pool).await;
        let source = SqlRecommendationSource::new(pool);

        let mut many: Vec<ProductId> = (1_000..41_000).map(ProductId).collect();
        many.push(catalog.phone_b.id);

        let by_id = source.candidates_by_ids(&many).await.expect("candidates by id");
        let ids: Vec<_> = by_id.iter().map(|candidate| candidate.product.id).collect();
        assert_eq!(ids, vec![catalog.phone_b.id]);

        many.push(catalog.phone_a.id);
        let newest = source.newest_candidates(&many, 10).await.expect("newest");
        let ids: Vec<_> = newest.iter().map(|candidate| candidate.product.id).collect();
        assert_eq!(ids, vec![catalog.case_c.id]);
    }
}
