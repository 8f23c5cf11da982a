use std::collections::HashSet;

use tracing::{debug, warn};

use super::scoring::{
    category_relevance, co_viewer_counts, compare_collaborative, compare_newest,
    compare_popularity, compare_price_distance, compare_relevance, price_proximity_bonus,
    within_price_envelope,
};
use super::{RecommendationPolicy, RecommendationSource};
use crate::domain::product::{Product, ProductId};
use crate::domain::recommendation::{
    Candidate, Recommendation, RecommendationStrategy, RecommendationTier,
};
use crate::errors::{ApplicationError, DomainError};

/// Stages of the fallback chain, in the order they are consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChainStage {
    Collaborative,
    CategoryAndPrice,
    Popular,
    Newest,
}

impl ChainStage {
    const ORDER: [ChainStage; 4] =
        [Self::Collaborative, Self::CategoryAndPrice, Self::Popular, Self::Newest];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Collaborative => "collaborative",
            Self::CategoryAndPrice => "category_price",
            Self::Popular => "popular",
            Self::Newest => "newest",
        }
    }
}

/// Collects tier output until the limit is reached, dropping ids already chosen.
struct TierAccumulator {
    limit: usize,
    seen: HashSet<ProductId>,
    picks: Vec<Recommendation>,
}

impl TierAccumulator {
    fn new(seed: ProductId, limit: usize) -> Self {
        Self { limit, seen: HashSet::from([seed]), picks: Vec::with_capacity(limit) }
    }

    fn is_full(&self) -> bool {
        self.picks.len() >= self.limit
    }

    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.picks.len())
    }

    fn excluded(&self) -> HashSet<ProductId> {
        self.seen.clone()
    }

    fn absorb(&mut self, recommendations: Vec<Recommendation>) -> usize {
        let before = self.picks.len();
        for recommendation in recommendations {
            if self.is_full() {
                break;
            }
            if self.seen.insert(recommendation.product.id) {
                self.picks.push(recommendation);
            }
        }
        self.picks.len() - before
    }

    fn finish(self) -> Vec<Recommendation> {
        self.picks
    }
}

/// Item-to-item recommendations computed on read from the current store state.
pub struct RecommendationEngine<S> {
    source: S,
    policy: RecommendationPolicy,
}

impl<S: RecommendationSource> RecommendationEngine<S> {
    pub fn new(source: S, policy: RecommendationPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &RecommendationPolicy {
        &self.policy
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn recommend_with(
        &self,
        strategy: RecommendationStrategy,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        match strategy {
            RecommendationStrategy::Chain => self.recommend(product_id, limit).await,
            RecommendationStrategy::Collaborative => {
                self.recommend_collaborative(product_id, limit).await
            }
            RecommendationStrategy::Category => self.recommend_by_category(product_id, limit).await,
        }
    }

    /// "Actors who viewed this also viewed": ranked by distinct co-viewers.
    ///
    /// Returns only what the co-view signal supports; a short or empty list is
    /// not an error.
    pub async fn recommend_collaborative(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let seed = self.seed(product_id).await?;
        self.collaborative_tier(&seed, &HashSet::from([seed.id]), limit).await
    }

    /// Same-category products ranked by blended relevance, widened to other
    /// categories inside the price envelope when the category under-supplies.
    pub async fn recommend_by_category(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let seed = self.seed(product_id).await?;
        self.category_tier(&seed, &HashSet::from([seed.id]), limit).await
    }

    /// Fallback chain used by the product-detail read path.
    ///
    /// Only a missing seed product is surfaced as an error. A failing tier
    /// contributes nothing and the chain moves on.
    pub async fn recommend(
        &self,
        product_id: ProductId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let seed = self.seed(product_id).await?;
        let mut accumulator = TierAccumulator::new(seed.id, limit);

        for stage in ChainStage::ORDER {
            if accumulator.is_full() {
                break;
            }

            let excluded = accumulator.excluded();
            let remaining = accumulator.remaining();
            let outcome = match stage {
                ChainStage::Collaborative => {
                    self.collaborative_tier(&seed, &excluded, remaining).await
                }
                ChainStage::CategoryAndPrice => {
                    self.category_tier(&seed, &excluded, remaining).await
                }
                ChainStage::Popular => self.popular_tier(&excluded, remaining).await,
                ChainStage::Newest => self.newest_tier(&excluded, remaining).await,
            };

            match outcome {
                Ok(recommendations) => {
                    let added = accumulator.absorb(recommendations);
                    debug!(
                        event_name = "recommend.tier.completed",
                        product_id = %seed.id,
                        tier = stage.as_str(),
                        added,
                        "recommendation tier completed"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "recommend.tier.degraded",
                        product_id = %seed.id,
                        tier = stage.as_str(),
                        error = %error,
                        "recommendation tier failed; continuing with the next tier"
                    );
                }
            }
        }

        Ok(accumulator.finish())
    }

    async fn seed(&self, product_id: ProductId) -> Result<Product, ApplicationError> {
        self.source
            .find_product(product_id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound(product_id).into())
    }

    async fn collaborative_tier(
        &self,
        seed: &Product,
        excluded: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let co_views = self.source.co_views(seed.id).await?;
        let counts = co_viewer_counts(seed.id, &co_views);
        let mut ids: Vec<ProductId> = counts
            .iter()
            .filter(|(id, co_viewers)| {
                **co_viewers >= self.policy.min_co_viewers && !excluded.contains(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ids.sort();

        let mut ranked: Vec<(Candidate, u32)> = self
            .source
            .candidates_by_ids(&ids)
            .await?
            .into_iter()
            .filter(|candidate| candidate.product.in_stock())
            .filter_map(|candidate| {
                let co_viewers = counts.get(&candidate.product.id).copied()?;
                Some((candidate, co_viewers))
            })
            .collect();
        ranked.sort_by(|(left, left_count), (right, right_count)| {
            compare_collaborative((left, *left_count), (right, *right_count))
        });

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(candidate, co_viewers)| {
                candidate
                    .into_recommendation(f64::from(co_viewers), RecommendationTier::Collaborative)
            })
            .collect())
    }

    async fn category_tier(
        &self,
        seed: &Product,
        excluded: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut exclude_ids: Vec<ProductId> = excluded.iter().copied().collect();
        exclude_ids.sort();

        let mut scored: Vec<(Candidate, f64)> = self
            .source
            .category_candidates(&seed.category, &exclude_ids)
            .await?
            .into_iter()
            .filter(|candidate| eligible(candidate, excluded))
            .map(|candidate| {
                let score = category_relevance(seed, &candidate, &self.policy);
                (candidate, score)
            })
            .collect();
        scored.sort_by(|(left, left_score), (right, right_score)| {
            compare_relevance((left, *left_score), (right, *right_score))
        });

        let mut picks: Vec<Recommendation> = scored
            .into_iter()
            .take(limit)
            .map(|(candidate, score)| {
                candidate.into_recommendation(score, RecommendationTier::Category)
            })
            .collect();
        if picks.len() >= limit {
            return Ok(picks);
        }

        let mut widened = excluded.clone();
        widened.extend(picks.iter().map(|pick| pick.product.id));
        exclude_ids.extend(picks.iter().map(|pick| pick.product.id));

        let mut nearby: Vec<Candidate> = self
            .source
            .cross_category_candidates(&seed.category, &exclude_ids)
            .await?
            .into_iter()
            .filter(|candidate| candidate.product.category != seed.category)
            .filter(|candidate| eligible(candidate, &widened))
            .filter(|candidate| within_price_envelope(seed, candidate, &self.policy))
            .collect();
        nearby.sort_by(|left, right| compare_price_distance(seed, left, right));

        let remaining = limit - picks.len();
        picks.extend(nearby.into_iter().take(remaining).map(|candidate| {
            let score = price_proximity_bonus(seed.price, candidate.product.price, &self.policy);
            candidate.into_recommendation(score, RecommendationTier::PriceRange)
        }));

        Ok(picks)
    }

    async fn popular_tier(
        &self,
        excluded: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let exclude_ids = sorted_ids(excluded);
        let mut candidates: Vec<Candidate> = self
            .source
            .popular_candidates(&exclude_ids, limit)
            .await?
            .into_iter()
            .filter(|candidate| candidate.view_count > 0 && eligible(candidate, excluded))
            .collect();
        candidates.sort_by(compare_popularity);

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|candidate| {
                let score = candidate.view_count as f64;
                candidate.into_recommendation(score, RecommendationTier::Popular)
            })
            .collect())
    }

    async fn newest_tier(
        &self,
        excluded: &HashSet<ProductId>,
        limit: usize,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let exclude_ids = sorted_ids(excluded);
        let mut candidates: Vec<Candidate> = self
            .source
            .newest_candidates(&exclude_ids, limit)
            .await?
            .into_iter()
            .filter(|candidate| eligible(candidate, excluded))
            .collect();
        candidates.sort_by(compare_newest);

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|candidate| candidate.into_recommendation(0.0, RecommendationTier::Newest))
            .collect())
    }
}

fn eligible(candidate: &Candidate, excluded: &HashSet<ProductId>) -> bool {
    candidate.product.in_stock() && !excluded.contains(&candidate.product.id)
}

fn sorted_ids(ids: &HashSet<ProductId>) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = ids.iter().copied().collect();
    ids.sort();
    ids
}
