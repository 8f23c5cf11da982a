use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductView};

/// Which stage of the fallback chain produced a recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    Collaborative,
    Category,
    PriceRange,
    Popular,
    Newest,
}

impl RecommendationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collaborative => "collaborative",
            Self::Category => "category",
            Self::PriceRange => "price_range",
            Self::Popular => "popular",
            Self::Newest => "newest",
        }
    }
}

/// Strategy selectable by callers of the recommendation read path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    /// Collaborative, then category/price, then popular, then newest.
    #[default]
    Chain,
    Collaborative,
    Category,
}

impl RecommendationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Collaborative => "collaborative",
            Self::Category => "category",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chain" | "" => Some(Self::Chain),
            "collaborative" => Some(Self::Collaborative),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

/// Derived per request, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: ProductView,
    pub view_count: u64,
    pub relevance_score: f64,
    pub tier: RecommendationTier,
}

/// A product considered by a recommender together with its popularity signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub product: Product,
    pub view_count: u64,
}

impl Candidate {
    pub fn into_recommendation(
        self,
        relevance_score: f64,
        tier: RecommendationTier,
    ) -> Recommendation {
        Recommendation {
            product: self.product.view(),
            view_count: self.view_count,
            relevance_score,
            tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RecommendationStrategy;

    #[test]
    fn strategy_parsing_defaults_to_chain() {
        assert_eq!(RecommendationStrategy::parse(""), Some(RecommendationStrategy::Chain));
        assert_eq!(
            RecommendationStrategy::parse(" Collaborative "),
            Some(RecommendationStrategy::Collaborative)
        );
        assert_eq!(
            RecommendationStrategy::parse("category"),
            Some(RecommendationStrategy::Category)
        );
        assert_eq!(RecommendationStrategy::parse("random"), None);
    }
}
