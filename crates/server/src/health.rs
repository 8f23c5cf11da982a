use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use storefront_db::{migrations, DbPool};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub status: Readiness,
    pub detail: String,
}

impl Probe {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: Readiness::Ready, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: Readiness::Degraded, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub schema: Probe,
    pub catalog: Probe,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// 200 when the schema is current and the catalog answers, 503 otherwise.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let schema = schema_probe(&state.db_pool).await;
    let catalog = catalog_probe(&state.db_pool).await;
    let status = if schema.status == Readiness::Ready && catalog.status == Readiness::Ready {
        Readiness::Ready
    } else {
        Readiness::Degraded
    };

    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    let report = HealthReport {
        status,
        schema,
        catalog,
        checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    (code, Json(report))
}

async fn schema_probe(pool: &DbPool) -> Probe {
    match migrations::status(pool).await {
        Ok(status) if status.is_current() => {
            Probe::ready(format!("{} migrations applied", status.applied))
        }
        Ok(status) => Probe::degraded(format!(
            "{} of {} migrations applied",
            status.applied, status.expected
        )),
        Err(error) => Probe::degraded(format!("migration ledger unreadable: {error}")),
    }
}

async fn catalog_probe(pool: &DbPool) -> Probe {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product").fetch_one(pool).await {
        Ok(products) => Probe::ready(format!("{products} products listed")),
        Err(error) => Probe::degraded(format!("catalog query failed: {error}")),
    }
}
