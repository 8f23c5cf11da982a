use chrono::Duration;

use storefront_core::domain::interaction::UserId;
use storefront_core::domain::session::{Session, SessionToken};

use super::{
    format_timestamp, is_foreign_key_violation, is_unique_violation, new_session_token,
    store_now, RepositoryError, SessionRepository,
};
use crate::DbPool;

const ROLES: &[&str] = &["customer", "admin"];

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_user(&self, token: &SessionToken) -> Result<Option<UserId>, RepositoryError> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM user_session WHERE token = ? AND expires_at > ?",
        )
        .bind(token.expose())
        .bind(format_timestamp(store_now()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id.map(UserId))
    }

    async fn create_user(&self, email: &str, role: &str) -> Result<UserId, RepositoryError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RepositoryError::Invalid("email must not be empty".to_string()));
        }
        if !ROLES.contains(&role) {
            return Err(RepositoryError::Invalid(format!(
                "role `{role}` must be one of {}",
                ROLES.join(", ")
            )));
        }

        let result = sqlx::query("INSERT INTO app_user (email, role, created_at) VALUES (?, ?, ?)")
            .bind(email)
            .bind(role)
            .bind(format_timestamp(store_now()))
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    RepositoryError::Conflict(format!("email `{email}` is already registered"))
                } else {
                    RepositoryError::Database(error)
                }
            })?;

        Ok(UserId(result.last_insert_rowid()))
    }

    async fn create_session(
        &self,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<Session, RepositoryError> {
        let token = new_session_token()?;
        let created_at = store_now();
        let expires_at = created_at + ttl;

        sqlx::query(
            "INSERT INTO user_session (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token.expose())
        .bind(user_id.0)
        .bind(format_timestamp(created_at))
        .bind(format_timestamp(expires_at))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                RepositoryError::user_not_found(user_id)
            } else {
                RepositoryError::Database(error)
            }
        })?;

        Ok(Session { token, user_id, created_at, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use storefront_core::domain::interaction::UserId;
    use storefront_core::domain::session::SessionToken;

    use super::SqlSessionRepository;
    use crate::repositories::test_support::migrated_pool;
    use crate::repositories::{RepositoryError, SessionRepository};

    #[tokio::test]
    async fn live_session_resolves_to_its_user() {
        let repo = SqlSessionRepository::new(migrated_pool().await);
        let user_id = repo.create_user("shopper@example.com", "customer").await.expect("user");

        let session = repo.create_session(user_id, Duration::hours(2)).await.expect("session");

        assert!(!session.is_expired_at(session.created_at));
        assert_eq!(repo.find_user(&session.token).await.expect("lookup"), Some(user_id));
    }

    #[tokio::test]
    async fn expired_and_unknown_tokens_resolve_to_nobody() {
        let repo = SqlSessionRepository::new(migrated_pool().await);
        let user_id = repo.create_user("shopper@example.com", "customer").await.expect("user");
        let expired = repo.create_session(user_id, Duration::seconds(-1)).await.expect("session");

        assert_eq!(repo.find_user(&expired.token).await.expect("lookup"), None);

        let unknown = SessionToken::new("not-a-session").expect("token");
        assert_eq!(repo.find_user(&unknown).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn users_are_validated_and_unique() {
        let repo = SqlSessionRepository::new(migrated_pool().await);
        repo.create_user("shopper@example.com", "customer").await.expect("user");

        assert!(matches!(
            repo.create_user("shopper@example.com", "admin").await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            repo.create_user("other@example.com", "owner").await,
            Err(RepositoryError::Invalid(_))
        ));
        assert!(matches!(
            repo.create_session(UserId(404), Duration::hours(1)).await,
            Err(RepositoryError::NotFound { entity: "user", .. })
        ));
    }
}
