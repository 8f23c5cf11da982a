use sqlx::SqliteConnection;

use storefront_core::domain::interaction::{Actor, Interaction};
use storefront_core::domain::product::{Product, ProductId};

use super::product::{row_to_product, PRODUCT_COLUMNS};
use super::trending::upsert_counter;
use super::{
    begin_write, format_timestamp, is_foreign_key_violation, store_now, InteractionRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn insert_interaction(
    conn: &mut SqliteConnection,
    interaction: &Interaction,
) -> Result<(), RepositoryError> {
    let viewed_at = format_timestamp(interaction.viewed_at);
    let result = match &interaction.actor {
        Actor::User(user_id) => {
            sqlx::query(
                "INSERT INTO user_interaction (user_id, product_id, viewed_at) VALUES (?, ?, ?)",
            )
            .bind(user_id.0)
            .bind(interaction.product_id.0)
            .bind(&viewed_at)
            .execute(&mut *conn)
            .await
        }
        Actor::Guest(guest_id) => {
            sqlx::query(
                "INSERT INTO guest_interaction (guest_id, product_id, viewed_at) VALUES (?, ?, ?)",
            )
            .bind(guest_id.as_str())
            .bind(interaction.product_id.0)
            .bind(&viewed_at)
            .execute(&mut *conn)
            .await
        }
    };

    match (result, &interaction.actor) {
        (Ok(_), _) => Ok(()),
        (Err(error), Actor::User(user_id)) if is_foreign_key_violation(&error) => {
            Err(RepositoryError::user_not_found(*user_id))
        }
        (Err(error), _) if is_foreign_key_violation(&error) => {
            Err(RepositoryError::product_not_found(interaction.product_id))
        }
        (Err(error), _) => Err(RepositoryError::Database(error)),
    }
}

#[async_trait::async_trait]
impl InteractionRepository for SqlInteractionRepository {
    async fn record_view(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> Result<Interaction, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = begin_write(&mut conn).await?;

        let title: Option<String> = sqlx::query_scalar("SELECT name FROM product WHERE id = ?")
            .bind(product_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(title) = title else {
            return Err(RepositoryError::product_not_found(product_id));
        };

        let interaction = Interaction { actor: actor.clone(), product_id, viewed_at: store_now() };
        insert_interaction(&mut tx, &interaction).await?;
        upsert_counter(&mut tx, product_id, &title, interaction.viewed_at).await?;
        tx.commit().await?;

        Ok(interaction)
    }

    async fn view_history(&self, actor: &Actor) -> Result<Vec<Product>, RepositoryError> {
        let (table, actor_column) = match actor {
            Actor::User(_) => ("user_interaction", "user_id"),
            Actor::Guest(_) => ("guest_interaction", "guest_id"),
        };
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM {table} i
             JOIN product p ON p.id = i.product_id
             WHERE i.{actor_column} = ?
             ORDER BY i.viewed_at DESC, i.id DESC"
        );

        let query = sqlx::query(&sql);
        let query = match actor {
            Actor::User(user_id) => query.bind(user_id.0),
            Actor::Guest(guest_id) => query.bind(guest_id.as_str()),
        };
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(row_to_product).collect()
    }
}
