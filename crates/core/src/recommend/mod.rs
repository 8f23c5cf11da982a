//! Product recommendations built from view tracking.
//!
//! Two strategies feed a fallback chain: collaborative ("actors who viewed X
//! also viewed Y") and category/price similarity. When both under-supply, the
//! chain tops up with store-wide popular products and then the newest ones.
//! Scoring lives in [`scoring`] as plain functions so the ranking policy can be
//! tested without a store.

mod engine;
mod memory;
pub mod scoring;
mod source;

use rust_decimal::Decimal;

pub use engine::RecommendationEngine;
pub use memory::InMemoryRecommendationSource;
pub use source::RecommendationSource;

/// Recommendations returned by the product-detail read path.
pub const DEFAULT_LIMIT: usize = 5;

/// Upper bound accepted from callers.
pub const DEFAULT_MAX_LIMIT: usize = 50;

/// Distinct co-viewing actors required before a collaborative candidate counts.
pub const DEFAULT_MIN_CO_VIEWERS: u32 = 1;

/// Bonus points added to a candidate's relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceBonuses {
    /// Price within the tight band of the seed (default: 50)
    pub tight_band: f64,
    /// Price within the wide band of the seed (default: 30)
    pub wide_band: f64,
    /// Price outside both bands (default: 10)
    pub outside_bands: f64,
    /// Candidate has stock on hand (default: 20)
    pub in_stock: f64,
    /// Multiplier applied to the trending view count (default: 1.0)
    pub popularity_weight: f64,
}

impl Default for RelevanceBonuses {
    fn default() -> Self {
        Self {
            tight_band: 50.0,
            wide_band: 30.0,
            outside_bands: 10.0,
            in_stock: 20.0,
            popularity_weight: 1.0,
        }
    }
}

/// Tunable knobs of the recommendation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationPolicy {
    pub min_co_viewers: u32,
    pub tight_price_band: Decimal,
    pub wide_price_band: Decimal,
    /// Maximum absolute price distance for cross-category candidates.
    pub cross_category_price_envelope: Decimal,
    pub bonuses: RelevanceBonuses,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            min_co_viewers: DEFAULT_MIN_CO_VIEWERS,
            tight_price_band: Decimal::from(200),
            wide_price_band: Decimal::from(400),
            cross_category_price_envelope: Decimal::from(300),
            bonuses: RelevanceBonuses::default(),
        }
    }
}
