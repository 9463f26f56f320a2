//! Fetch command - one ingestion cycle for a single platform

use anyhow::{Context, Result};
use skillfeed_domain::{DataSource, IngestPhase, IngestReport};
use std::path::PathBuf;

use crate::args::FetchArgs;
use crate::config::AppConfig;
use crate::wiring::App;

pub async fn execute(args: FetchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = App::build(&config).await?;

    let report = app
        .orchestrator
        .ingest(args.platform)
        .await
        .with_context(|| format!("Platform {} is not enabled", args.platform))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &IngestReport) {
    let source = match report.source {
        Some(DataSource::Live) => "live",
        Some(DataSource::Stale) => "stale cache",
        None => "none",
    };

    println!("{} ingestion", report.platform.label());
    match report.outcome() {
        Some(IngestPhase::Skipped) => {
            println!("  skipped: no live or cached data");
        }
        _ => {
            println!("  source:   {}", source);
            println!("  fetched:  {}", report.fetched);
            println!("  created:  {}", report.created);
            println!("  updated:  {}", report.updated);
            println!("  filtered: {}", report.filtered);
            println!("  failed:   {}", report.failed);
        }
    }
}
