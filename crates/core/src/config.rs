use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommend::{
    RecommendationPolicy, RelevanceBonuses, DEFAULT_LIMIT, DEFAULT_MAX_LIMIT,
    DEFAULT_MIN_CO_VIEWERS,
};

pub const DEFAULT_CONFIG_FILE: &str = "storefront.toml";
pub const NESTED_CONFIG_FILE: &str = "config/storefront.toml";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub recommendations: RecommendationConfig,
    pub guest: GuestConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub min_co_viewers: u32,
    pub tight_price_band: Decimal,
    pub wide_price_band: Decimal,
    pub cross_category_price_envelope: Decimal,
    pub trending_limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GuestConfig {
    pub cookie_name: String,
    pub cookie_max_age_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub port: Option<u16>,
    pub default_limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("`{path}` is not valid storefront TOML: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    MissingConfigFile(PathBuf),
    #[error("`${{{var}}}` is referenced by the config file but not set")]
    MissingEnvInterpolation { var: String },
    #[error("`${{` without a closing `}}` in config file")]
    UnterminatedInterpolation,
    #[error("{key}=`{value}` could not be parsed")]
    InvalidEnvOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://storefront.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            recommendations: RecommendationConfig::default(),
            guest: GuestConfig { cookie_name: "guest_id".to_string(), cookie_max_age_days: 30 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        let policy = RecommendationPolicy::default();
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            min_co_viewers: DEFAULT_MIN_CO_VIEWERS,
            tight_price_band: policy.tight_price_band,
            wide_price_band: policy.wide_price_band,
            cross_category_price_envelope: policy.cross_category_price_envelope,
            trending_limit: 10,
        }
    }
}

impl RecommendationConfig {
    pub fn policy(&self) -> RecommendationPolicy {
        RecommendationPolicy {
            min_co_viewers: self.min_co_viewers,
            tight_price_band: self.tight_price_band,
            wide_price_band: self.wide_price_band,
            cross_category_price_envelope: self.cross_category_price_envelope,
            bonuses: RelevanceBonuses::default(),
        }
    }

    /// Missing or zero limits fall back to the default; larger ones are capped.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(0) | None => self.default_limit,
            Some(limit) => limit.min(self.max_limit),
        }
    }
}

impl GuestConfig {
    pub fn cookie_max_age_secs(&self) -> u64 {
        u64::from(self.cookie_max_age_days) * 24 * 60 * 60
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(recommendations) = patch.recommendations {
            let target = &mut self.recommendations;
            if let Some(default_limit) = recommendations.default_limit {
                target.default_limit = default_limit;
            }
            if let Some(max_limit) = recommendations.max_limit {
                target.max_limit = max_limit;
            }
            if let Some(min_co_viewers) = recommendations.min_co_viewers {
                target.min_co_viewers = min_co_viewers;
            }
            if let Some(tight_price_band) = recommendations.tight_price_band {
                target.tight_price_band = tight_price_band;
            }
            if let Some(wide_price_band) = recommendations.wide_price_band {
                target.wide_price_band = wide_price_band;
            }
            if let Some(envelope) = recommendations.cross_category_price_envelope {
                target.cross_category_price_envelope = envelope;
            }
            if let Some(trending_limit) = recommendations.trending_limit {
                target.trending_limit = trending_limit;
            }
        }

        if let Some(guest) = patch.guest {
            if let Some(cookie_name) = guest.cookie_name {
                self.guest.cookie_name = cookie_name;
            }
            if let Some(cookie_max_age_days) = guest.cookie_max_age_days {
                self.guest.cookie_max_age_days = cookie_max_age_days;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STOREFRONT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("STOREFRONT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("STOREFRONT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("STOREFRONT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STOREFRONT_SERVER_PORT") {
            self.server.port = parse_env("STOREFRONT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let recommendations = &mut self.recommendations;
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_DEFAULT_LIMIT") {
            recommendations.default_limit =
                parse_env("STOREFRONT_RECOMMENDATIONS_DEFAULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_MAX_LIMIT") {
            recommendations.max_limit = parse_env("STOREFRONT_RECOMMENDATIONS_MAX_LIMIT", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_MIN_CO_VIEWERS") {
            recommendations.min_co_viewers =
                parse_env("STOREFRONT_RECOMMENDATIONS_MIN_CO_VIEWERS", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_TIGHT_PRICE_BAND") {
            recommendations.tight_price_band =
                parse_env("STOREFRONT_RECOMMENDATIONS_TIGHT_PRICE_BAND", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_WIDE_PRICE_BAND") {
            recommendations.wide_price_band =
                parse_env("STOREFRONT_RECOMMENDATIONS_WIDE_PRICE_BAND", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_CROSS_CATEGORY_PRICE_ENVELOPE") {
            recommendations.cross_category_price_envelope =
                parse_env("STOREFRONT_RECOMMENDATIONS_CROSS_CATEGORY_PRICE_ENVELOPE", &value)?;
        }
        if let Some(value) = read_env("STOREFRONT_RECOMMENDATIONS_TRENDING_LIMIT") {
            recommendations.trending_limit =
                parse_env("STOREFRONT_RECOMMENDATIONS_TRENDING_LIMIT", &value)?;
        }

        if let Some(value) = read_env("STOREFRONT_GUEST_COOKIE_NAME") {
            self.guest.cookie_name = value;
        }
        if let Some(value) = read_env("STOREFRONT_GUEST_COOKIE_MAX_AGE_DAYS") {
            self.guest.cookie_max_age_days =
                parse_env("STOREFRONT_GUEST_COOKIE_MAX_AGE_DAYS", &value)?;
        }

        let log_level =
            read_env("STOREFRONT_LOGGING_LEVEL").or_else(|| read_env("STOREFRONT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STOREFRONT_LOGGING_FORMAT").or_else(|| read_env("STOREFRONT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(default_limit) = overrides.default_limit {
            self.recommendations.default_limit = default_limit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_recommendations(&self.recommendations)?;
        validate_guest(&self.guest)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Explicit path if it exists, otherwise the first default location found.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${NAME}` references from the process environment.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_recommendations(config: &RecommendationConfig) -> Result<(), ConfigError> {
    if config.default_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendations.default_limit must be greater than zero".to_string(),
        ));
    }

    if config.max_limit < config.default_limit {
        return Err(ConfigError::Validation(format!(
            "recommendations.max_limit ({}) must be >= recommendations.default_limit ({})",
            config.max_limit, config.default_limit
        )));
    }

    if config.min_co_viewers == 0 {
        return Err(ConfigError::Validation(
            "recommendations.min_co_viewers must be at least 1".to_string(),
        ));
    }

    let bands = [
        ("tight_price_band", config.tight_price_band),
        ("wide_price_band", config.wide_price_band),
        ("cross_category_price_envelope", config.cross_category_price_envelope),
    ];
    if let Some((name, value)) = bands.iter().find(|(_, value)| value.is_sign_negative()) {
        return Err(ConfigError::Validation(format!(
            "recommendations.{name} must not be negative (got {value})"
        )));
    }

    if config.wide_price_band < config.tight_price_band {
        return Err(ConfigError::Validation(
            "recommendations.wide_price_band must be >= recommendations.tight_price_band"
                .to_string(),
        ));
    }

    if config.trending_limit == 0 {
        return Err(ConfigError::Validation(
            "recommendations.trending_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_guest(guest: &GuestConfig) -> Result<(), ConfigError> {
    let name = guest.cookie_name.trim();
    let valid_name = !name.is_empty()
        && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !valid_name {
        return Err(ConfigError::Validation(
            "guest.cookie_name must be non-empty and use only [A-Za-z0-9_-]".to_string(),
        ));
    }

    if !(1..=365).contains(&guest.cookie_max_age_days) {
        return Err(ConfigError::Validation(
            "guest.cookie_max_age_days must be in range 1..=365".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    recommendations: Option<RecommendationPatch>,
    guest: Option<GuestPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationPatch {
    default_limit: Option<usize>,
    max_limit: Option<usize>,
    min_co_viewers: Option<u32>,
    tight_price_band: Option<Decimal>,
    wide_price_band: Option<Decimal>,
    cross_category_price_envelope: Option<Decimal>,
    trending_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GuestPatch {
    cookie_name: Option<String>,
    cookie_max_age_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{interpolate_env_vars, AppConfig, ConfigError, ConfigOverrides, LoadOptions};
    use super::LogFormat;

    /// Serializes env mutation across tests and unsets the touched keys on drop.
    struct EnvScope {
        keys: Vec<&'static str>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvScope {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
            let lock = LOCK
                .get_or_init(|| Mutex::new(()))
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for (key, value) in vars {
                env::set_var(key, value);
            }
            Self { keys: vars.iter().map(|(key, _)| *key).collect(), _lock: lock }
        }
    }

    impl Drop for EnvScope {
        fn drop(&mut self) {
            for key in &self.keys {
                env::remove_var(key);
            }
        }
    }

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("storefront.toml");
        fs::write(&path, contents).expect("write config file");
        path
    }

    fn load_from(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults validate");

        assert_eq!(config.recommendations.default_limit, 5);
        assert_eq!(config.recommendations.max_limit, 50);
        assert_eq!(config.recommendations.min_co_viewers, 1);
        assert_eq!(config.guest.cookie_name, "guest_id");
        assert_eq!(config.guest.cookie_max_age_secs(), 30 * 86_400);

        let policy = config.recommendations.policy();
        assert_eq!(policy.tight_price_band, Decimal::from(200));
        assert_eq!(policy.wide_price_band, Decimal::from(400));
        assert_eq!(policy.cross_category_price_envelope, Decimal::from(300));
    }

    #[test]
    fn limits_are_clamped_to_configured_bounds() {
        let config = AppConfig::default().recommendations;

        assert_eq!(config.clamp_limit(None), 5);
        assert_eq!(config.clamp_limit(Some(0)), 5);
        assert_eq!(config.clamp_limit(Some(12)), 12);
        assert_eq!(config.clamp_limit(Some(500)), 50);
    }

    #[test]
    fn interpolation_expands_and_reports_errors() {
        let _env = EnvScope::set(&[("STOREFRONT_TEST_HOST", "db.local")]);

        assert_eq!(
            interpolate_env_vars("url = \"${STOREFRONT_TEST_HOST}/x\" # $HOME").expect("expand"),
            "url = \"db.local/x\" # $HOME"
        );
        assert!(matches!(
            interpolate_env_vars("url = \"${STOREFRONT_TEST_HOST"),
            Err(ConfigError::UnterminatedInterpolation)
        ));
        assert!(matches!(
            interpolate_env_vars("${STOREFRONT_TEST_MISSING}"),
            Err(ConfigError::MissingEnvInterpolation { ref var })
                if var == "STOREFRONT_TEST_MISSING"
        ));
    }

    #[test]
    fn file_values_are_interpolated_and_parsed() {
        let _env = EnvScope::set(&[("STOREFRONT_TEST_DB", "sqlite://interpolated.db")]);
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            "[database]\nurl = \"${STOREFRONT_TEST_DB}\"\n\n\
             [recommendations]\ntight_price_band = 150\nwide_price_band = \"350.50\"\n",
        );

        let config = load_from(path).expect("load config");

        assert_eq!(config.database.url, "sqlite://interpolated.db");
        assert_eq!(config.recommendations.tight_price_band, Decimal::from(150));
        assert_eq!(config.recommendations.wide_price_band, Decimal::new(35_050, 2));
    }

    #[test]
    fn short_logging_env_names_are_accepted() {
        let _env =
            EnvScope::set(&[("STOREFRONT_LOG_LEVEL", "warn"), ("STOREFRONT_LOG_FORMAT", "json")]);

        let config = AppConfig::load(LoadOptions::default()).expect("load config");

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn overrides_beat_env_which_beats_file() {
        let _env = EnvScope::set(&[
            ("STOREFRONT_DATABASE_URL", "sqlite://from-env.db"),
            ("STOREFRONT_SERVER_PORT", "9090"),
        ]);
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            "[database]\nurl = \"sqlite://from-file.db\"\n[server]\nport = 7070\n\
             [guest]\ncookie_name = \"visitor\"\n[logging]\nlevel = \"warn\"\n",
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                database_url: Some("sqlite://from-override.db".to_string()),
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load config");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.guest.cookie_name, "visitor");
    }

    #[test]
    fn unparsable_env_number_names_the_variable() {
        let _env = EnvScope::set(&[("STOREFRONT_RECOMMENDATIONS_MAX_LIMIT", "lots")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("bad override");

        assert!(matches!(
            error,
            ConfigError::InvalidEnvOverride { ref key, .. }
                if key == "STOREFRONT_RECOMMENDATIONS_MAX_LIMIT"
        ));
    }

    #[test]
    fn inverted_price_bands_are_rejected() {
        let _env = EnvScope::set(&[("STOREFRONT_RECOMMENDATIONS_TIGHT_PRICE_BAND", "500")]);

        let error = AppConfig::load(LoadOptions::default()).expect_err("tight band above wide");

        assert!(matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("wide_price_band")
        ));
    }

    #[test]
    fn guest_cookie_lifetime_is_bounded() {
        let mut config = AppConfig::default();
        config.guest.cookie_max_age_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.guest.cookie_max_age_days = 366;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.guest.cookie_max_age_days = 365;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn required_file_must_exist() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does/not/exist/storefront.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
