use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use storefront_core::domain::interaction::Actor;
use storefront_core::domain::product::{Product, ProductId, ProductView};
use storefront_core::domain::recommendation::{Recommendation, RecommendationStrategy};
use storefront_core::domain::trending::TrendingEntry;
use storefront_core::errors::{ApplicationError, DomainError};
use storefront_db::RepositoryError;
use tracing::{info, warn};

use crate::context::{guest_from_cookies, CorrelationId, RequestActor};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: ProductView,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
    pub strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<usize>,
    pub in_stock_only: Option<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(product_detail))
        .route("/products/{id}/recommendations", get(product_recommendations))
        .route("/trending", get(trending))
        .route("/my/view-history", get(my_view_history))
        .route("/guest/view-history", get(guest_view_history))
        .with_state(state)
}

fn store_failure(error: RepositoryError, correlation_id: &str) -> ApiError {
    ApiError::from_application(error.into(), correlation_id)
}

fn views(products: &[Product]) -> Vec<ProductView> {
    products.iter().map(Product::view).collect()
}

async fn list_products(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let products =
        state.products.list_all().await.map_err(|error| store_failure(error, &correlation_id))?;
    Ok(Json(views(&products)))
}

/// Product detail read path: records the view, then attaches recommendations.
async fn product_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    request: RequestActor,
) -> Result<Response, ApiError> {
    let product_id = ProductId(id);
    let correlation_id = request.correlation_id.as_str();

    let product = state
        .products
        .find_by_id(product_id)
        .await
        .map_err(|error| store_failure(error, correlation_id))?
        .ok_or_else(|| {
            let missing = ApplicationError::from(DomainError::ProductNotFound(product_id));
            ApiError::from_application(missing, correlation_id)
        })?;

    match state.interactions.record_view(&request.actor, product_id).await {
        Ok(interaction) => info!(
            event_name = "tracking.view.recorded",
            correlation_id = %correlation_id,
            product_id = %product_id,
            actor_kind = interaction.actor.kind().as_str(),
            new_guest = request.is_minted_guest(),
            "product view recorded"
        ),
        Err(error) => warn!(
            event_name = "tracking.view.failed",
            correlation_id = %correlation_id,
            product_id = %product_id,
            actor_kind = request.actor.kind().as_str(),
            error = %error,
            "product view could not be recorded; serving the page anyway"
        ),
    }

    let recommendations = state
        .engine
        .recommend(product_id, state.recommendations.default_limit)
        .await
        .map_err(|error| ApiError::from_application(error, correlation_id))?;

    let response = Json(ProductDetail { product: product.view(), recommendations }).into_response();
    Ok(request.attach_cookie(response, &state.guest))
}

async fn product_recommendations(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RecommendationQuery>,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let strategy = match query.strategy.as_deref() {
        None => RecommendationStrategy::default(),
        Some(raw) => RecommendationStrategy::parse(raw).ok_or_else(|| {
            ApiError::bad_request(
                format!("unknown strategy `{raw}` (expected chain|collaborative|category)"),
                &correlation_id,
            )
        })?,
    };
    let limit = state.recommendations.clamp_limit(query.limit);

    let recommendations = state
        .engine
        .recommend_with(strategy, ProductId(id), limit)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    info!(
        event_name = "recommend.request.served",
        correlation_id = %correlation_id,
        product_id = id,
        strategy = strategy.as_str(),
        limit,
        returned = recommendations.len(),
        "recommendations served"
    );
    Ok(Json(recommendations))
}

async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<Json<Vec<TrendingEntry>>, ApiError> {
    let limit = match query.limit {
        None | Some(0) => state.recommendations.trending_limit,
        Some(limit) => limit.min(state.recommendations.max_limit),
    };

    let entries = state
        .trending
        .top_trending(limit, query.in_stock_only.unwrap_or(true))
        .await
        .map_err(|error| store_failure(error, &correlation_id))?;
    Ok(Json(entries))
}

async fn my_view_history(
    State(state): State<AppState>,
    request: RequestActor,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let Actor::User(_) = request.actor else {
        return Err(ApiError::unauthorized("a bearer session is required", &request.correlation_id));
    };

    let history = state
        .interactions
        .view_history(&request.actor)
        .await
        .map_err(|error| store_failure(error, &request.correlation_id))?;
    Ok(Json(views(&history)))
}

async fn guest_view_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let Some(guest_id) = guest_from_cookies(&headers, &state.guest.cookie_name) else {
        return Ok(Json(Vec::new()));
    };

    let history = state
        .interactions
        .view_history(&Actor::Guest(guest_id))
        .await
        .map_err(|error| store_failure(error, &correlation_id))?;
    Ok(Json(views(&history)))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::header::SET_COOKIE;
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::Router;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use storefront_core::config::AppConfig;
    use storefront_core::domain::product::{NewProduct, Product};
    use storefront_db::{
        connect_with_settings, migrations, DbPool, ProductRepository, SessionRepository,
        SqlProductRepository, SqlSessionRepository,
    };
    use tower::ServiceExt;

    use super::router;
    use crate::state::AppState;

    struct Harness {
        pool: DbPool,
        app: Router,
    }

    async fn harness() -> Harness {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let app = router(AppState::from_pool(pool.clone(), &AppConfig::default()));
        Harness { pool, app }
    }

    async fn product(pool: &DbPool, name: &str, category: &str, price: i64, stock: u32) -> Product {
        SqlProductRepository::new(pool.clone())
            .create(NewProduct {
                name: name.to_string(),
                description: String::new(),
                price: Decimal::from(price),
                category: category.to_string(),
                stock,
            })
            .await
            .expect("create product")
    }

    async fn get(
        app: &Router,
        uri: &str,
        headers: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder().uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    #[tokio::test]
    async fn first_visit_mints_a_guest_cookie_and_counts_the_view() {
        let harness = harness().await;
        let lamp = product(&harness.pool, "Lamp", "home", 40, 3).await;
        product(&harness.pool, "Rug", "home", 90, 2).await;

        let (status, headers, body) =
            get(&harness.app, &format!("/products/{}", lamp.id), &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["product"]["name"], "Lamp");
        assert_eq!(body["recommendations"][0]["product"]["name"], "Rug");
        let cookie = headers.get(SET_COOKIE).and_then(|value| value.to_str().ok()).expect("cookie");
        assert!(cookie.starts_with("guest_id=guest_"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=2592000"));

        let (_, _, trending) = get(&harness.app, "/trending", &[]).await;
        assert_eq!(trending[0]["product"]["id"], lamp.id.0);
        assert_eq!(trending[0]["view_count"], 1);
    }

    #[tokio::test]
    async fn returning_guest_keeps_their_id_and_history() {
        let harness = harness().await;
        let lamp = product(&harness.pool, "Lamp", "home", 40, 3).await;
        let cookie = [("cookie", "guest_id=guest_returning")];

        let (status, headers, _) =
            get(&harness.app, &format!("/products/{}", lamp.id), &cookie).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(SET_COOKIE).is_none());

        let (_, _, history) = get(&harness.app, "/guest/view-history", &cookie).await;
        assert_eq!(history.as_array().map(Vec::len), Some(1));

        let (status, _, anonymous) = get(&harness.app, "/guest/view-history", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(anonymous, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn signed_in_views_land_in_my_history() {
        let harness = harness().await;
        let lamp = product(&harness.pool, "Lamp", "home", 40, 3).await;
        let sessions = SqlSessionRepository::new(harness.pool.clone());
        let user_id = sessions.create_user("me@example.com", "customer").await.expect("user");
        let session = sessions.create_session(user_id, Duration::hours(1)).await.expect("session");
        let bearer = format!("Bearer {}", session.token.expose());
        let auth = [("authorization", bearer.as_str())];

        let (status, headers, _) =
            get(&harness.app, &format!("/products/{}", lamp.id), &auth).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(SET_COOKIE).is_none());

        let (status, _, history) = get(&harness.app, "/my/view-history", &auth).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history[0]["name"], "Lamp");

        let (status, _, _) = get(&harness.app, "/my/view-history", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_bearer_tokens_are_rejected() {
        let harness = harness().await;
        let lamp = product(&harness.pool, "Lamp", "home", 40, 3).await;

        let (status, _, body) = get(
            &harness.app,
            &format!("/products/{}", lamp.id),
            &[("authorization", "Bearer forged"), ("x-correlation-id", "req-401")],
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["correlation_id"], "req-401");
    }

    #[tokio::test]
    async fn missing_products_render_not_found_json() {
        let harness = harness().await;

        let (status, _, body) =
            get(&harness.app, "/products/999", &[("x-correlation-id", "req-404")]).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["correlation_id"], "req-404");
        assert!(body["error"].as_str().is_some_and(|message| !message.is_empty()));

        let (status, _, _) = get(&harness.app, "/products/999/recommendations", &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn recommendation_strategy_and_limit_are_validated() {
        let harness = harness().await;
        let phone = product(&harness.pool, "Phone A", "Smartphones", 999, 5).await;
        for index in 0..4 {
            product(&harness.pool, &format!("Phone {index}"), "Smartphones", 900, 5).await;
        }
        let base = format!("/products/{}/recommendations", phone.id);

        let (status, _, _) = get(&harness.app, &format!("{base}?strategy=magic"), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) =
            get(&harness.app, &format!("{base}?strategy=category&limit=2"), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
        assert_eq!(body[0]["tier"], "category");

        let (_, _, collaborative) =
            get(&harness.app, &format!("{base}?strategy=collaborative"), &[]).await;
        assert_eq!(collaborative, Value::Array(Vec::new()));

        let (_, _, chained) = get(&harness.app, &format!("{base}?limit=500"), &[]).await;
        assert_eq!(chained.as_array().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn trending_hides_sold_out_products_unless_asked() {
        let harness = harness().await;
        let sold_out = product(&harness.pool, "Sold Out", "toys", 10, 0).await;
        product(&harness.pool, "Available", "toys", 10, 4).await;

        let (_, _, default_view) = get(&harness.app, "/trending", &[]).await;
        assert_eq!(default_view.as_array().map(Vec::len), Some(1));
        assert_eq!(default_view[0]["display_title"], "Available");

        let (_, _, everything) = get(&harness.app, "/trending?in_stock_only=false", &[]).await;
        let ids: Vec<_> = everything
            .as_array()
            .map(|entries| entries.iter().map(|entry| entry["product"]["id"].clone()).collect())
            .unwrap_or_default();
        assert!(ids.contains(&Value::from(sold_out.id.0)));

        let (_, _, catalog) = get(&harness.app, "/products", &[]).await;
        assert_eq!(catalog.as_array().map(Vec::len), Some(2));
    }
}
