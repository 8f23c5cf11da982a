use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::interaction::CoView;
use crate::domain::product::{Product, ProductId};
use crate::domain::recommendation::Candidate;
use crate::errors::ApplicationError;

/// Read-only store access needed by [`super::RecommendationEngine`].
///
/// Candidate lists other than [`RecommendationSource::candidates_by_ids`] contain in-stock
/// products only. Ordering is not part of the contract; the engine ranks everything itself.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, ApplicationError>;

    /// Distinct (actor, product) pairs for every actor who viewed `seed`, users and guests
    /// alike, excluding the seed product itself.
    async fn co_views(&self, seed: ProductId) -> Result<Vec<CoView>, ApplicationError>;

    async fn candidates_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError>;

    async fn category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError>;

    /// In-stock products outside `category`.
    async fn cross_category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError>;

    /// In-stock products with at least one recorded view, most viewed first.
    async fn popular_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError>;

    /// In-stock products, most recently created first.
    async fn newest_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError>;
}

#[async_trait]
impl<T: RecommendationSource + ?Sized> RecommendationSource for Arc<T> {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, ApplicationError> {
        (**self).find_product(id).await
    }

    async fn co_views(&self, seed: ProductId) -> Result<Vec<CoView>, ApplicationError> {
        (**self).co_views(seed).await
    }

    async fn candidates_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        (**self).candidates_by_ids(ids).await
    }

    async fn category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        (**self).category_candidates(category, exclude).await
    }

    async fn cross_category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        (**self).cross_category_candidates(category, exclude).await
    }

    async fn popular_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        (**self).popular_candidates(exclude, limit).await
    }

    async fn newest_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        (**self).newest_candidates(exclude, limit).await
    }
}
