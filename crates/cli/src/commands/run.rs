//! Run command - periodic ingestion of every enabled platform

use anyhow::Result;
use skillfeed_domain::usecases::TriggerOutcome;
use std::path::PathBuf;

use crate::args::RunArgs;
use crate::config::AppConfig;
use crate::wiring::App;

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let app = App::build(&config).await?;
    let scheduler = app.scheduler(&config);

    tracing::info!(
        once = args.once,
        platforms = ?app.platforms.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        database = %config.general.database_path.display(),
        "Starting skillfeed run"
    );

    if args.once {
        for (platform, outcome) in scheduler.trigger_all().await {
            match outcome {
                TriggerOutcome::Ran(report) => {
                    tracing::info!(
                        platform = %platform,
                        outcome = ?report.outcome(),
                        created = report.created,
                        updated = report.updated,
                        "Ingestion finished"
                    );
                }
                TriggerOutcome::Overlapping | TriggerOutcome::ClaimedElsewhere => {
                    tracing::info!(platform = %platform, "Already handled for this interval");
                }
                TriggerOutcome::NotScheduled => {
                    tracing::debug!(platform = %platform, "Not scheduled");
                }
                TriggerOutcome::Failed(error) => {
                    tracing::error!(platform = %platform, error = %error, "Ingestion failed");
                }
            }
        }
    } else {
        // Set up graceful shutdown
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        };

        scheduler.run_until(shutdown).await;
    }

    tracing::info!("skillfeed run completed");
    Ok(())
}
