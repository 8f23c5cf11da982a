use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use super::RecommendationSource;
use crate::domain::interaction::{Actor, CoView};
use crate::domain::product::{Product, ProductId};
use crate::domain::recommendation::Candidate;
use crate::errors::ApplicationError;

/// Store-free source used by tests and demos. Every recorded view also counts
/// toward the product's popularity, mirroring the transactional recorder.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecommendationSource {
    products: BTreeMap<ProductId, Product>,
    views: Vec<(Actor, ProductId)>,
}

impl InMemoryRecommendationSource {
    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn record_view(&mut self, actor: Actor, product_id: ProductId) {
        self.views.push((actor, product_id));
    }

    fn view_count(&self, product_id: ProductId) -> u64 {
        self.views.iter().filter(|(_, viewed)| *viewed == product_id).count() as u64
    }

    fn candidate(&self, product: &Product) -> Candidate {
        Candidate { product: product.clone(), view_count: self.view_count(product.id) }
    }

    fn in_stock_where<F>(&self, exclude: &[ProductId], predicate: F) -> Vec<Candidate>
    where
        F: Fn(&Product) -> bool,
    {
        self.products
            .values()
            .filter(|product| product.in_stock() && !exclude.contains(&product.id))
            .filter(|product| predicate(product))
            .map(|product| self.candidate(product))
            .collect()
    }
}

#[async_trait]
impl RecommendationSource for InMemoryRecommendationSource {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(self.products.get(&id).cloned())
    }

    async fn co_views(&self, seed: ProductId) -> Result<Vec<CoView>, ApplicationError> {
        let seed_viewers: HashSet<&Actor> = self
            .views
            .iter()
            .filter(|(_, product)| *product == seed)
            .map(|(actor, _)| actor)
            .collect();

        let mut seen = HashSet::new();
        Ok(self
            .views
            .iter()
            .filter(|(actor, product)| *product != seed && seed_viewers.contains(actor))
            .filter(|(actor, product)| seen.insert((actor.clone(), *product)))
            .map(|(actor, product)| CoView { actor: actor.clone(), product_id: *product })
            .collect())
    }

    async fn candidates_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        Ok(ids.iter().filter_map(|id| self.products.get(id)).map(|p| self.candidate(p)).collect())
    }

    async fn category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        Ok(self.in_stock_where(exclude, |product| product.category == category))
    }

    async fn cross_category_candidates(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Candidate>, ApplicationError> {
        Ok(self.in_stock_where(exclude, |product| product.category != category))
    }

    async fn popular_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let mut candidates = self.in_stock_where(exclude, |_| true);
        candidates.retain(|candidate| candidate.view_count > 0);
        candidates.sort_by(super::scoring::compare_popularity);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn newest_candidates(
        &self,
        exclude: &[ProductId],
        limit: usize,
    ) -> Result<Vec<Candidate>, ApplicationError> {
        let mut candidates = self.in_stock_where(exclude, |_| true);
        candidates.sort_by(super::scoring::compare_newest);
        candidates.truncate(limit);
        Ok(candidates)
    }
}
