use std::env;
use std::fs;
use std::path::Path;

use serde::Serialize;
use storefront_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

struct SourceContext<'a> {
    doc: Option<&'a Value>,
    path: Option<&'a Path>,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let path = resolve_config_path(None);
    let doc = load_config_file_doc(path.as_deref());
    let context = SourceContext { doc: doc.as_ref(), path: path.as_deref() };

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        effective_entries(&config, &context),
    )
}

fn effective_entries(config: &AppConfig, context: &SourceContext<'_>) -> Vec<ConfigEntry> {
    let database = &config.database;
    let server = &config.server;
    let recommendations = &config.recommendations;
    let guest = &config.guest;

    vec![
        entry(context, "database.url", &database.url, &["STOREFRONT_DATABASE_URL"]),
        entry(
            context,
            "database.max_connections",
            database.max_connections,
            &["STOREFRONT_DATABASE_MAX_CONNECTIONS"],
        ),
        entry(
            context,
            "database.timeout_secs",
            database.timeout_secs,
            &["STOREFRONT_DATABASE_TIMEOUT_SECS"],
        ),
        entry(
            context,
            "server.bind_address",
            &server.bind_address,
            &["STOREFRONT_SERVER_BIND_ADDRESS"],
        ),
        entry(context, "server.port", server.port, &["STOREFRONT_SERVER_PORT"]),
        entry(
            context,
            "server.graceful_shutdown_secs",
            server.graceful_shutdown_secs,
            &["STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            context,
            "recommendations.default_limit",
            recommendations.default_limit,
            &["STOREFRONT_RECOMMENDATIONS_DEFAULT_LIMIT"],
        ),
        entry(
            context,
            "recommendations.max_limit",
            recommendations.max_limit,
            &["STOREFRONT_RECOMMENDATIONS_MAX_LIMIT"],
        ),
        entry(
            context,
            "recommendations.min_co_viewers",
            recommendations.min_co_viewers,
            &["STOREFRONT_RECOMMENDATIONS_MIN_CO_VIEWERS"],
        ),
        entry(
            context,
            "recommendations.tight_price_band",
            recommendations.tight_price_band,
            &["STOREFRONT_RECOMMENDATIONS_TIGHT_PRICE_BAND"],
        ),
        entry(
            context,
            "recommendations.wide_price_band",
            recommendations.wide_price_band,
            &["STOREFRONT_RECOMMENDATIONS_WIDE_PRICE_BAND"],
        ),
        entry(
            context,
            "recommendations.cross_category_price_envelope",
            recommendations.cross_category_price_envelope,
            &["STOREFRONT_RECOMMENDATIONS_CROSS_CATEGORY_PRICE_ENVELOPE"],
        ),
        entry(
            context,
            "recommendations.trending_limit",
            recommendations.trending_limit,
            &["STOREFRONT_RECOMMENDATIONS_TRENDING_LIMIT"],
        ),
        entry(context, "guest.cookie_name", &guest.cookie_name, &["STOREFRONT_GUEST_COOKIE_NAME"]),
        entry(
            context,
            "guest.cookie_max_age_days",
            guest.cookie_max_age_days,
            &["STOREFRONT_GUEST_COOKIE_MAX_AGE_DAYS"],
        ),
        entry(
            context,
            "logging.level",
            &config.logging.level,
            &["STOREFRONT_LOGGING_LEVEL", "STOREFRONT_LOG_LEVEL"],
        ),
        entry(
            context,
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["STOREFRONT_LOGGING_FORMAT", "STOREFRONT_LOG_FORMAT"],
        ),
    ]
}

fn entry(
    context: &SourceContext<'_>,
    key: &'static str,
    value: impl ToString,
    env_keys: &[&str],
) -> ConfigEntry {
    ConfigEntry { key, value: value.to_string(), source: field_source(key, env_keys, context) }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], context: &SourceContext<'_>) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = context.doc {
        if contains_path(doc, key_path) {
            let file_path = context
                .path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
