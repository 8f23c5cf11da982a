use std::sync::Arc;

use storefront_core::config::{AppConfig, GuestConfig, RecommendationConfig};
use storefront_core::recommend::{RecommendationEngine, RecommendationSource};
use storefront_db::{
    DbPool, InteractionRepository, ProductRepository, SessionRepository,
    SqlInteractionRepository, SqlProductRepository, SqlRecommendationSource, SqlSessionRepository,
    SqlTrendingRepository, TrendingRepository,
};

pub type Engine = RecommendationEngine<Arc<dyn RecommendationSource>>;

/// Handles shared by every request. Each one is injected; nothing is global.
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
    pub trending: Arc<dyn TrendingRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub engine: Arc<Engine>,
    pub recommendations: RecommendationConfig,
    pub guest: GuestConfig,
}

impl AppState {
    pub fn from_pool(pool: DbPool, config: &AppConfig) -> Self {
        let source: Arc<dyn RecommendationSource> =
            Arc::new(SqlRecommendationSource::new(pool.clone()));

        Self {
            products: Arc::new(SqlProductRepository::new(pool.clone())),
            interactions: Arc::new(SqlInteractionRepository::new(pool.clone())),
            trending: Arc::new(SqlTrendingRepository::new(pool.clone())),
            sessions: Arc::new(SqlSessionRepository::new(pool)),
            engine: Arc::new(RecommendationEngine::new(
                source,
                config.recommendations.policy(),
            )),
            recommendations: config.recommendations.clone(),
            guest: config.guest.clone(),
        }
    }
}
