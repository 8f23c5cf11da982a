use serde::Serialize;
use storefront_core::config::{AppConfig, LoadOptions};
use storefront_db::{connect_with_config, migrations};

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DB_CONNECT, EXIT_MIGRATION};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: 0 }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: format!("skipped because {reason}"),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
        let (overall_status, summary) = if all_pass {
            (CheckStatus::Pass, "doctor: all readiness checks passed")
        } else {
            (CheckStatus::Fail, "doctor: one or more readiness checks failed")
        };

        Self { overall_status, summary: summary.to_string(), checks }
    }

    /// Exit code of the first failed check.
    fn exit_code(&self) -> u8 {
        self.checks
            .iter()
            .find(|check| check.status == CheckStatus::Fail)
            .map(|check| check.exit_code)
            .unwrap_or(0)
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return DoctorReport::from_checks(vec![
                DoctorCheck::fail("config_validation", error.to_string(), EXIT_CONFIG),
                DoctorCheck::skipped("database_connectivity", "configuration did not load"),
                DoctorCheck::skipped("schema_migrations", "configuration did not load"),
            ]);
        }
    };

    let mut checks = vec![DoctorCheck::pass(
        "config_validation",
        "configuration loaded and validated",
    )];
    checks.extend(check_database(&config));
    DoctorReport::from_checks(checks)
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                    EXIT_DB_CONNECT,
                ),
                DoctorCheck::skipped("schema_migrations", "the database was unreachable"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                        EXIT_DB_CONNECT,
                    ),
                    DoctorCheck::skipped("schema_migrations", "the database was unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = match migrations::status(&pool).await {
            Ok(status) if status.is_current() => DoctorCheck::pass(
                "schema_migrations",
                format!("{} of {} migrations applied", status.applied, status.expected),
            ),
            Ok(status) => DoctorCheck::fail(
                "schema_migrations",
                format!(
                    "{} of {} migrations applied; run `storefront migrate`",
                    status.applied, status.expected
                ),
                EXIT_MIGRATION,
            ),
            Err(error) => DoctorCheck::fail(
                "schema_migrations",
                format!("failed to read migration ledger: {error}"),
                EXIT_MIGRATION,
            ),
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
