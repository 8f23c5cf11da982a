pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront operator CLI",
    long_about = "Operate the storefront catalog: migrations, demo data, config inspection, \
                  readiness checks, trending and recommendation queries.",
    after_help = "Examples:\n  storefront migrate\n  storefront seed\n  \
                  storefront doctor --json\n  storefront recommend 1 --strategy category"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Apply migrations, then load the demo catalog (idempotent by product name)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity and schema migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the most viewed products")]
    Trending {
        #[arg(long, help = "Maximum entries to return (defaults to the configured trending limit)")]
        limit: Option<usize>,
        #[arg(long, help = "Include products that are out of stock")]
        include_out_of_stock: bool,
    },
    #[command(about = "Recommend products related to a catalog entry")]
    Recommend {
        #[arg(help = "Id of the product to recommend for")]
        product_id: i64,
        #[arg(long, help = "Maximum recommendations (clamped to the configured max)")]
        limit: Option<usize>,
        #[arg(long, help = "One of: chain, collaborative, category")]
        strategy: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Trending { limit, include_out_of_stock } => {
            commands::trending::run(limit, include_out_of_stock)
        }
        Command::Recommend { product_id, limit, strategy } => {
            commands::recommend::run(product_id, limit, strategy.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
