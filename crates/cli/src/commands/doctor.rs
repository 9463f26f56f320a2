//! Doctor command - validate configuration and show status

use anyhow::Result;
use serde::Serialize;
use skillfeed_adapters::store::SqliteStore;
use skillfeed_domain::Platform;
use std::path::{Path, PathBuf};

use crate::args::DoctorArgs;
use crate::config::{AppConfig, load_secret};

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    database: CheckResult,
    platforms: Vec<PlatformCheck>,
    overall: String,
}

#[derive(Debug, Serialize)]
struct PlatformCheck {
    platform: Platform,
    #[serde(flatten)]
    result: CheckResult,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        platforms: vec![],
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.database = check_database(&config.general.database_path).await;
        report.platforms = check_platforms(config);
    }

    let checks: Vec<&CheckResult> = [&report.config, &report.database]
        .into_iter()
        .chain(report.platforms.iter().map(|p| &p.result))
        .collect();

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_database(path: &Path) -> CheckResult {
    let store = match SqliteStore::new(path).await {
        Ok(store) => store,
        Err(e) => return CheckResult::error(format!("Cannot open {}: {}", path.display(), e)),
    };

    match store.ping().await {
        Ok(()) => CheckResult::ok(format!("{} (schema up to date)", path.display())),
        Err(e) => CheckResult::error(format!("Query failed on {}: {}", path.display(), e)),
    }
}

fn check_platforms(config: &AppConfig) -> Vec<PlatformCheck> {
    let enabled = match config.enabled_platforms() {
        Ok(enabled) => enabled,
        Err(e) => {
            return vec![PlatformCheck {
                platform: Platform::Community,
                result: CheckResult::error(format!("{:#}", e)),
            }];
        }
    };

    Platform::INGESTED
        .into_iter()
        .map(|platform| {
            let result = if !enabled.contains(&platform) {
                CheckResult::ok("Disabled in scheduler.platforms")
            } else {
                check_credential(config, platform)
            };
            PlatformCheck { platform, result }
        })
        .collect()
}

fn check_credential(config: &AppConfig, platform: Platform) -> CheckResult {
    let (env_var, required) = match platform {
        Platform::X => (&config.x.bearer_token_env, true),
        Platform::YouTube => (&config.youtube.api_key_env, true),
        Platform::DevTo => (&config.devto.api_key_env, false),
        Platform::Bluesky => return CheckResult::ok("Public search API, no credential needed"),
        Platform::Community => return CheckResult::ok("Not ingested"),
    };

    match (load_secret(env_var).is_some(), required) {
        (true, _) => CheckResult::ok(format!("Credential: {} (set)", env_var)),
        (false, true) => CheckResult::warn(format!(
            "Credential: {} (not set), adapter will fetch nothing",
            env_var
        )),
        (false, false) => CheckResult::ok(format!(
            "Credential: {} (not set), using anonymous access",
            env_var
        )),
    }
}

fn print_report(report: &DoctorReport) {
    println!("skillfeed Doctor Report");
    println!("=======================");
    println!();

    print_check("Config", &report.config);
    print_check("Database", &report.database);
    for check in &report.platforms {
        print_check(check.platform.label(), &check.result);
    }

    println!();
    println!(
        "{} Overall: {}",
        symbol(&report.overall),
        report.overall.to_uppercase()
    );

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: skillfeed run --once");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    println!("{} {}: {}", symbol(&result.status), name, result.message);
}

fn symbol(status: &str) -> &'static str {
    match status {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    }
}
