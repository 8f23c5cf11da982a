use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use tokio::sync::RwLock;

use storefront_core::domain::interaction::{Actor, Interaction, UserId};
use storefront_core::domain::product::{NewProduct, Product, ProductId};
use storefront_core::domain::session::{Session, SessionToken};
use storefront_core::domain::trending::{TrendingCounter, TrendingEntry};

use super::{
    new_session_token, store_now, InteractionRepository, ProductRepository, RepositoryError,
    SessionRepository, TrendingRepository,
};

#[derive(Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    next_product_id: i64,
    interactions: Vec<Interaction>,
    trending: BTreeMap<ProductId, TrendingCounter>,
    users: BTreeMap<UserId, String>,
    next_user_id: i64,
    sessions: HashMap<String, Session>,
}

impl MemoryState {
    fn name_taken(&self, name: &str, except: Option<ProductId>) -> bool {
        self.products.values().any(|product| product.name == name && Some(product.id) != except)
    }

    fn insert_product(&mut self, product: NewProduct) -> Result<Product, RepositoryError> {
        product.validate()?;
        let name = product.name.trim().to_string();
        if self.name_taken(&name, None) {
            return Err(name_conflict(&name));
        }

        self.next_product_id += 1;
        let now = store_now();
        let created = Product {
            id: ProductId(self.next_product_id),
            name,
            description: product.description,
            price: product.price,
            category: product.category.trim().to_string(),
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        self.products.insert(created.id, created.clone());
        Ok(created)
    }

    fn bump(&mut self, product_id: ProductId, title: &str) {
        let counter = self.trending.entry(product_id).or_insert_with(|| TrendingCounter {
            product_id,
            display_title: title.to_string(),
            view_count: 0,
        });
        counter.view_count += 1;
        counter.display_title = title.to_string();
    }
}

fn name_conflict(name: &str) -> RepositoryError {
    RepositoryError::Conflict(format!("product name `{name}` is already in use"))
}

/// Store-free backend for every repository trait, behind one lock so that
/// multi-table writes stay atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryStore {
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        self.state.write().await.insert_product(product)
    }

    async fn create_many(
        &self,
        products: Vec<NewProduct>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut state = self.state.write().await;
        let next_product_id = state.next_product_id;
        let mut created = Vec::with_capacity(products.len());
        for product in products {
            match state.insert_product(product) {
                Ok(product) => created.push(product),
                Err(error) => {
                    for product in &created {
                        state.products.remove(&product.id);
                    }
                    state.next_product_id = next_product_id;
                    return Err(error);
                }
            }
        }
        Ok(created)
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.state.read().await.products.values().cloned().collect())
    }

    async fn list_by_category(
        &self,
        category: &str,
        exclude: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .filter(|product| product.in_stock() && product.category == category)
            .filter(|product| !exclude.contains(&product.id))
            .cloned()
            .collect())
    }

    async fn update(&self, product: Product) -> Result<Product, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(current) = state.products.get(&product.id).cloned() else {
            return Err(RepositoryError::product_not_found(product.id));
        };
        NewProduct {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            category: product.category.clone(),
            stock: product.stock,
        }
        .validate()?;

        let name = product.name.trim().to_string();
        if state.name_taken(&name, Some(product.id)) {
            return Err(name_conflict(&name));
        }

        let updated = Product {
            name,
            category: product.category.trim().to_string(),
            created_at: current.created_at,
            updated_at: store_now(),
            ..product
        };
        state.products.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.products.remove(&id).is_none() {
            return Err(RepositoryError::product_not_found(id));
        }
        state.interactions.retain(|interaction| interaction.product_id != id);
        state.trending.remove(&id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl InteractionRepository for InMemoryStore {
    async fn record_view(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> Result<Interaction, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(title) = state.products.get(&product_id).map(|product| product.name.clone())
        else {
            return Err(RepositoryError::product_not_found(product_id));
        };
        if let Actor::User(user_id) = actor {
            if !state.users.contains_key(user_id) {
                return Err(RepositoryError::user_not_found(*user_id));
            }
        }

        let interaction = Interaction { actor: actor.clone(), product_id, viewed_at: store_now() };
        state.interactions.push(interaction.clone());
        state.bump(product_id, &title);
        Ok(interaction)
    }

    async fn view_history(&self, actor: &Actor) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .interactions
            .iter()
            .rev()
            .filter(|interaction| &interaction.actor == actor)
            .filter_map(|interaction| state.products.get(&interaction.product_id).cloned())
            .collect())
    }
}

#[async_trait::async_trait]
impl TrendingRepository for InMemoryStore {
    async fn bump_view(&self, product_id: ProductId, title: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&product_id) {
            return Err(RepositoryError::product_not_found(product_id));
        }
        state.bump(product_id, title);
        Ok(())
    }

    async fn top_trending(
        &self,
        limit: usize,
        in_stock_only: bool,
    ) -> Result<Vec<TrendingEntry>, RepositoryError> {
        let state = self.state.read().await;
        let mut ranked: Vec<(&Product, TrendingEntry)> = state
            .products
            .values()
            .filter(|product| !in_stock_only || product.in_stock())
            .map(|product| {
                let counter = state.trending.get(&product.id);
                let entry = TrendingEntry {
                    product: product.view(),
                    display_title: counter
                        .map_or_else(|| product.name.clone(), |c| c.display_title.clone()),
                    view_count: counter.map_or(0, |c| c.view_count),
                };
                (product, entry)
            })
            .collect();

        ranked.sort_by(|(left, left_entry), (right, right_entry)| {
            right_entry
                .view_count
                .cmp(&left_entry.view_count)
                .then_with(|| right.created_at.cmp(&left.created_at))
                .then_with(|| right.id.cmp(&left.id))
        });
        Ok(ranked.into_iter().take(limit).map(|(_, entry)| entry).collect())
    }

    async fn counter(
        &self,
        product_id: ProductId,
    ) -> Result<Option<TrendingCounter>, RepositoryError> {
        Ok(self.state.read().await.trending.get(&product_id).cloned())
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemoryStore {
    async fn find_user(&self, token: &SessionToken) -> Result<Option<UserId>, RepositoryError> {
        let state = self.state.read().await;
        let now = store_now();
        Ok(state
            .sessions
            .get(token.expose())
            .filter(|session| !session.is_expired_at(now))
            .map(|session| session.user_id))
    }

    async fn create_user(&self, email: &str, role: &str) -> Result<UserId, RepositoryError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RepositoryError::Invalid("email must not be empty".to_string()));
        }
        if role != "customer" && role != "admin" {
            return Err(RepositoryError::Invalid(format!("role `{role}` is not supported")));
        }

        let mut state = self.state.write().await;
        if state.users.values().any(|existing| existing == email) {
            return Err(RepositoryError::Conflict(format!("email `{email}` is already registered")));
        }
        state.next_user_id += 1;
        let user_id = UserId(state.next_user_id);
        state.users.insert(user_id, email.to_string());
        Ok(user_id)
    }

    async fn create_session(
        &self,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<Session, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(RepositoryError::user_not_found(user_id));
        }

        let created_at = store_now();
        let session = Session {
            token: new_session_token()?,
            user_id,
            created_at,
            expires_at: created_at + ttl,
        };
        state.sessions.insert(session.token.expose().to_string(), session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use storefront_core::domain::interaction::{Actor, GuestId};
    use storefront_core::domain::product::ProductId;

    use super::InMemoryStore;
    use crate::repositories::test_support::new_product;
    use crate::repositories::{
        InteractionRepository, ProductRepository, RepositoryError, SessionRepository,
        TrendingRepository,
    };

    #[tokio::test]
    async fn views_feed_history_and_trending() {
        let store = InMemoryStore::new();
        let lamp = store.create(new_product("Lamp", "home", 20, 2)).await.expect("lamp");
        let rug = store.create(new_product("Rug", "home", 80, 0)).await.expect("rug");
        let guest = Actor::Guest(GuestId::new("guest_1").expect("guest"));

        for product_id in [lamp.id, rug.id, rug.id] {
            store.record_view(&guest, product_id).await.expect("record");
        }

        let history = store.view_history(&guest).await.expect("history");
        let ids: Vec<_> = history.iter().map(|product| product.id).collect();
        assert_eq!(ids, vec![rug.id, rug.id, lamp.id]);

        let in_stock = store.top_trending(5, true).await.expect("trending");
        assert_eq!(in_stock.len(), 1);
        assert_eq!(in_stock[0].product.id, lamp.id);

        let all = store.top_trending(5, false).await.expect("trending");
        assert_eq!(all[0].product.id, rug.id);
        assert_eq!(all[0].view_count, 2);
    }

    #[tokio::test]
    async fn failed_batch_leaves_catalog_untouched() {
        let store = InMemoryStore::new();
        store.create(new_product("Lamp", "home", 20, 2)).await.expect("lamp");

        let result = store
            .create_many(vec![new_product("Rug", "home", 80, 1), new_product("Lamp", "home", 5, 1)])
            .await;

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert_eq!(store.list_all().await.expect("list").len(), 1);
        let next = store.create(new_product("Rug", "home", 80, 1)).await.expect("rug");
        assert_eq!(next.id, ProductId(2));
    }

    #[tokio::test]
    async fn delete_cascades_views_and_counter() {
        let store = InMemoryStore::new();
        let lamp = store.create(new_product("Lamp", "home", 20, 2)).await.expect("lamp");
        let guest = Actor::Guest(GuestId::new("guest_1").expect("guest"));
        store.record_view(&guest, lamp.id).await.expect("record");

        store.delete(lamp.id).await.expect("delete");

        assert!(store.view_history(&guest).await.expect("history").is_empty());
        assert!(store.counter(lamp.id).await.expect("counter").is_none());
        assert!(matches!(
            store.record_view(&guest, lamp.id).await,
            Err(RepositoryError::NotFound { entity: "product", .. })
        ));
    }

    #[tokio::test]
    async fn sessions_expire() {
        let store = InMemoryStore::new();
        let user_id = store.create_user("a@example.com", "customer").await.expect("user");
        let live = store.create_session(user_id, Duration::minutes(5)).await.expect("live");
        let stale = store.create_session(user_id, Duration::minutes(-5)).await.expect("stale");

        assert_eq!(store.find_user(&live.token).await.expect("lookup"), Some(user_id));
        assert_eq!(store.find_user(&stale.token).await.expect("lookup"), None);
    }
}
