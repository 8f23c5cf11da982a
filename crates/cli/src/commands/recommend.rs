use storefront_core::domain::product::ProductId;
use storefront_core::domain::recommendation::RecommendationStrategy;
use storefront_core::recommend::RecommendationEngine;
use storefront_db::SqlRecommendationSource;

use crate::commands::{
    open_pool, prepare, query_failed, CommandResult, StepError, EXIT_INVALID_ARGUMENT,
    EXIT_NOT_FOUND,
};

pub fn run(product_id: i64, limit: Option<usize>, strategy: Option<&str>) -> CommandResult {
    let strategy = match strategy.map(RecommendationStrategy::parse) {
        None => RecommendationStrategy::default(),
        Some(Some(strategy)) => strategy,
        Some(None) => {
            return CommandResult::failure(
                "recommend",
                "invalid_argument",
                "strategy must be one of chain|collaborative|category",
                EXIT_INVALID_ARGUMENT,
            );
        }
    };

    let (config, runtime) = match prepare("recommend") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let limit = config.recommendations.clamp_limit(limit);

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let engine = RecommendationEngine::new(
            SqlRecommendationSource::new(pool.clone()),
            config.recommendations.policy(),
        );
        let outcome = engine.recommend_with(strategy, ProductId(product_id), limit).await;
        pool.close().await;

        outcome.map_err(|error| -> StepError {
            if error.is_not_found() {
                ("not_found", error.to_string(), EXIT_NOT_FOUND)
            } else {
                query_failed(error)
            }
        })
    });

    match result {
        Ok(recommendations) => CommandResult::success_with_data(
            "recommend",
            format!(
                "{} recommendations for product {product_id} ({} strategy)",
                recommendations.len(),
                strategy.as_str()
            ),
            recommendations,
        ),
        Err(step) => CommandResult::from_step("recommend", step),
    }
}
