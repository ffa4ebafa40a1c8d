use mailquote_core::config::{AppConfig, LoadOptions};
use mailquote_db::connect_from_config;
use serde::Serialize;
use tokio::runtime::Runtime;

use crate::commands::{probe, runtime, CommandResult};

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
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let runtime = match runtime("doctor") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };
    let report = build_report(&runtime, options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        return CommandResult::report("doctor", &report, exit_code);
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(runtime: &Runtime, options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_credentials(&config));
            checks.push(check_database_connectivity(runtime, &config));
            checks.push(check_mailbox_connection(runtime, &config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["mailbox_credentials", "database_connectivity", "mailbox_connection"] {
                checks.push(skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    match config.graph.credentials() {
        Ok(_) => DoctorCheck {
            name: "mailbox_credentials",
            status: CheckStatus::Pass,
            details: "tenant, client id, client secret and mailbox address are set".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "mailbox_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_database_connectivity(runtime: &Runtime, config: &AppConfig) -> DoctorCheck {
    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_mailbox_connection(runtime: &Runtime, config: &AppConfig) -> DoctorCheck {
    if !config.graph.credential_presence().all_present() {
        return skipped("mailbox_connection", "mailbox credentials are incomplete");
    }

    let prober = match probe::prober(config) {
        Ok(prober) => prober,
        Err(error) => {
            return DoctorCheck {
                name: "mailbox_connection",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let result = runtime.block_on(prober.probe(&config.graph));
    if result.success {
        let mailbox = result
            .mailbox_info
            .map(|info| info.mail)
            .unwrap_or_else(|| "mailbox".to_string());
        return DoctorCheck {
            name: "mailbox_connection",
            status: CheckStatus::Pass,
            details: format!("token acquired and `{mailbox}` is readable"),
        };
    }

    DoctorCheck {
        name: "mailbox_connection",
        status: CheckStatus::Fail,
        details: format!(
            "failed at step {}: {}",
            result.step.as_str(),
            result.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: format!("skipped because {reason}"),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

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
