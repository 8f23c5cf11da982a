use storefront_db::{SqlTrendingRepository, TrendingRepository};

use crate::commands::{open_pool, prepare, query_failed, CommandResult, StepError};

pub fn run(limit: Option<usize>, include_out_of_stock: bool) -> CommandResult {
    let (config, runtime) = match prepare("trending") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let limit = match limit {
        None | Some(0) => config.recommendations.trending_limit,
        Some(limit) => limit.min(config.recommendations.max_limit),
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let entries = SqlTrendingRepository::new(pool.clone())
            .top_trending(limit, !include_out_of_stock)
            .await
            .map_err(query_failed)?;
        pool.close().await;
        Ok::<_, StepError>(entries)
    });

    match result {
        Ok(entries) => CommandResult::success_with_data(
            "trending",
            format!("{} trending products", entries.len()),
            entries,
        ),
        Err(step) => CommandResult::from_step("trending", step),
    }
}
