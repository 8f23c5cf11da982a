//! Scoring and ranking rules for recommendation candidates

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::RecommendationPolicy;
use crate::domain::interaction::{Actor, CoView};
use crate::domain::product::{Product, ProductId};
use crate::domain::recommendation::Candidate;

/// Tiered price-proximity bonus: tight band, then wide band, then a flat floor.
pub fn price_proximity_bonus(
    seed_price: Decimal,
    candidate_price: Decimal,
    policy: &RecommendationPolicy,
) -> f64 {
    let distance = (candidate_price - seed_price).abs();
    if distance <= policy.tight_price_band {
        policy.bonuses.tight_band
    } else if distance <= policy.wide_price_band {
        policy.bonuses.wide_band
    } else {
        policy.bonuses.outside_bands
    }
}

/// Popularity + price proximity + stock bonus.
pub fn category_relevance(
    seed: &Product,
    candidate: &Candidate,
    policy: &RecommendationPolicy,
) -> f64 {
    let popularity = candidate.view_count as f64 * policy.bonuses.popularity_weight;
    let proximity = price_proximity_bonus(seed.price, candidate.product.price, policy);
    let stock = if candidate.product.in_stock() { policy.bonuses.in_stock } else { 0.0 };

    popularity + proximity + stock
}

pub fn price_distance(seed: &Product, candidate: &Candidate) -> Decimal {
    (candidate.product.price - seed.price).abs()
}

pub fn within_price_envelope(
    seed: &Product,
    candidate: &Candidate,
    policy: &RecommendationPolicy,
) -> bool {
    price_distance(seed, candidate) <= policy.cross_category_price_envelope
}

/// Counts distinct co-viewing actors per product, ignoring the seed.
///
/// Repeated views by one actor count once here; frequency only matters to trending.
pub fn co_viewer_counts(seed: ProductId, co_views: &[CoView]) -> HashMap<ProductId, u32> {
    let mut actors: HashMap<ProductId, HashSet<&Actor>> = HashMap::new();
    for co_view in co_views.iter().filter(|co_view| co_view.product_id != seed) {
        actors.entry(co_view.product_id).or_default().insert(&co_view.actor);
    }

    actors
        .into_iter()
        .map(|(product_id, viewers)| {
            (product_id, u32::try_from(viewers.len()).unwrap_or(u32::MAX))
        })
        .collect()
}

/// Co-viewer count descending, then view count descending, then id ascending.
pub fn compare_collaborative(
    (left, left_co_viewers): (&Candidate, u32),
    (right, right_co_viewers): (&Candidate, u32),
) -> Ordering {
    right_co_viewers
        .cmp(&left_co_viewers)
        .then_with(|| right.view_count.cmp(&left.view_count))
        .then_with(|| left.product.id.cmp(&right.product.id))
}

/// Relevance descending, then view count descending, then id ascending.
pub fn compare_relevance(
    (left, left_score): (&Candidate, f64),
    (right, right_score): (&Candidate, f64),
) -> Ordering {
    right_score
        .total_cmp(&left_score)
        .then_with(|| right.view_count.cmp(&left.view_count))
        .then_with(|| left.product.id.cmp(&right.product.id))
}

/// Price distance ascending, then view count descending, then id ascending.
pub fn compare_price_distance(seed: &Product, left: &Candidate, right: &Candidate) -> Ordering {
    price_distance(seed, left)
        .cmp(&price_distance(seed, right))
        .then_with(|| right.view_count.cmp(&left.view_count))
        .then_with(|| left.product.id.cmp(&right.product.id))
}

/// View count descending; ties go to the newer product, then the lower id.
pub fn compare_popularity(left: &Candidate, right: &Candidate) -> Ordering {
    right
        .view_count
        .cmp(&left.view_count)
        .then_with(|| right.product.created_at.cmp(&left.product.created_at))
        .then_with(|| left.product.id.cmp(&right.product.id))
}

pub fn compare_newest(left: &Candidate, right: &Candidate) -> Ordering {
    right
        .product
        .created_at
        .cmp(&left.product.created_at)
        .then_with(|| left.product.id.cmp(&right.product.id))
}

/// Decimal distance rendered for relevance reporting on cross-category picks.
pub fn distance_as_f64(distance: Decimal) -> f64 {
    distance.to_f64().unwrap_or(f64::MAX)
}
