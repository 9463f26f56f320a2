//! Config command - write an example configuration file

use anyhow::{Context, Result};
use std::path::Path;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(&path, force).await,
    }
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, AppConfig::example_toml())
        .await
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    let defaults = AppConfig::default();
    println!("Created config file: {}", path.display());
    println!();
    println!("Credentials are read from the environment:");
    println!("  X        {}", defaults.x.bearer_token_env);
    println!("  YouTube  {}", defaults.youtube.api_key_env);
    println!("  DEV.to   {} (optional)", defaults.devto.api_key_env);
    println!("Bluesky search needs no credential.");
    println!();
    println!("Run 'skillfeed doctor' to check the setup, then 'skillfeed run --once'.");

    Ok(())
}
