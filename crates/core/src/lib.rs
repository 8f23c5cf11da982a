pub mod config;
pub mod domain;
pub mod errors;
pub mod recommend;

pub use domain::interaction::{Actor, ActorKind, CoView, GuestId, Interaction, UserId};
pub use domain::product::{NewProduct, Product, ProductId, ProductView};
pub use domain::recommendation::{Recommendation, RecommendationStrategy, RecommendationTier};
pub use domain::session::{Session, SessionToken};
pub use domain::trending::{TrendingCounter, TrendingEntry};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use recommend::{
    InMemoryRecommendationSource, RecommendationEngine, RecommendationPolicy, RecommendationSource,
};
