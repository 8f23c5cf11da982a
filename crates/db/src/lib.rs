pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
#[cfg(any(test, feature = "test-support"))]
pub use repositories::InMemoryStore;
pub use repositories::{
    InteractionRepository, ProductRepository, RepositoryError, SessionRepository,
    SqlInteractionRepository, SqlProductRepository, SqlRecommendationSource, SqlSessionRepository,
    SqlTrendingRepository, TrendingRepository,
};
