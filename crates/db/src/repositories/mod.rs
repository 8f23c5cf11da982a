use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::{Connection, Sqlite, SqliteConnection, Transaction};
use thiserror::Error;

use storefront_core::domain::interaction::{Actor, Interaction, UserId};
use storefront_core::domain::product::{NewProduct, Product, ProductId};
use storefront_core::domain::session::{Session, SessionToken};
use storefront_core::domain::trending::{TrendingCounter, TrendingEntry};
use storefront_core::errors::{ApplicationError, DomainError};

pub mod interaction;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod product;
pub mod recommendation;
pub mod session;
#[cfg(test)]
mod test_support;
pub mod trending;

pub use interaction::SqlInteractionRepository;
#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryStore;
pub use product::SqlProductRepository;
pub use recommendation::SqlRecommendationSource;
pub use session::SqlSessionRepository;
pub use trending::SqlTrendingRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl RepositoryError {
    pub fn product_not_found(id: ProductId) -> Self {
        Self::NotFound { entity: "product", id: id.to_string() }
    }

    pub fn user_not_found(id: UserId) -> Self {
        Self::NotFound { entity: "user", id: id.to_string() }
    }
}

impl From<DomainError> for RepositoryError {
    fn from(error: DomainError) -> Self {
        Self::Invalid(error.to_string())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity: "product", ref id } => match id.parse::<i64>() {
                Ok(id) => DomainError::ProductNotFound(ProductId(id)).into(),
                Err(_) => ApplicationError::Persistence(error.to_string()),
            },
            RepositoryError::NotFound { entity: "user", .. } => {
                DomainError::InvalidActor(error.to_string()).into()
            }
            RepositoryError::Invalid(message) | RepositoryError::Conflict(message) => {
                DomainError::InvariantViolation(message).into()
            }
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// Catalog access. Names are unique; writes re-check that before touching the table.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Inserts every product or none of them.
    async fn create_many(
        &self,
        products: Vec<NewProduct>,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;

    /// In-stock products of `category`, id ascending, minus `exclude`.
    async fn list_by_category(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn update(&self, product: Product) -> Result<Product, RepositoryError>;

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError>;
}

/// View tracking for users and guests.
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Stores the interaction and bumps the trending counter atomically.
    async fn record_view(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> Result<Interaction, RepositoryError>;

    /// One entry per view, most recent first.
    async fn view_history(&self, actor: &Actor) -> Result<Vec<Product>, RepositoryError>;
}

#[async_trait]
pub trait TrendingRepository: Send + Sync {
    /// Inserts a counter at 1 or increments it, replacing the display title.
    async fn bump_view(&self, product_id: ProductId, title: &str) -> Result<(), RepositoryError>;

    async fn top_trending(
        &self,
        limit: usize,
        in_stock_only: bool,
    ) -> Result<Vec<TrendingEntry>, RepositoryError>;

    async fn counter(&self, product_id: ProductId)
        -> Result<Option<TrendingCounter>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// User behind an unexpired session token.
    async fn find_user(&self, token: &SessionToken) -> Result<Option<UserId>, RepositoryError>;

    async fn create_user(&self, email: &str, role: &str) -> Result<UserId, RepositoryError>;

    async fn create_session(
        &self,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<Session, RepositoryError>;
}

/// Transaction holding the write lock from `BEGIN`. A deferred transaction that
/// reads before writing fails with SQLITE_BUSY when another writer commits
/// first; `BEGIN IMMEDIATE` waits on `busy_timeout` instead.
pub(crate) async fn begin_write(
    conn: &mut SqliteConnection,
) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
    conn.begin_with("BEGIN IMMEDIATE").await
}

/// Current time at the precision timestamps are stored with.
pub(crate) fn store_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(database) => database.is_unique_violation(),
        _ => false,
    }
}

pub(crate) fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(database) => database.is_foreign_key_violation(),
        _ => false,
    }
}

pub(crate) fn new_session_token() -> Result<SessionToken, RepositoryError> {
    let raw = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
    SessionToken::new(raw)
        .ok_or_else(|| RepositoryError::Invalid("generated session token was empty".to_string()))
}
