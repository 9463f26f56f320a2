//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use skillfeed_domain::Platform;
use std::path::PathBuf;

/// skillfeed: scheduled ingestion of Laravel + AI posts into one canonical feed
#[derive(Parser, Debug)]
#[command(name = "skillfeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion scheduler
    Run(RunArgs),

    /// Run one ingestion cycle for a platform
    Fetch(FetchArgs),

    /// Show stored posts
    Feed(FeedArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Trigger every platform once and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Platform to ingest (x, bluesky, youtube, devto)
    #[arg(long, short)]
    pub platform: Platform,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FeedArgs {
    /// Only show posts from this platform
    #[arg(long, short)]
    pub platform: Option<Platform>,

    /// Only show featured posts
    #[arg(long)]
    pub featured: bool,

    /// Include hidden posts
    #[arg(long)]
    pub include_hidden: bool,

    /// Maximum number of posts
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./skillfeed.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
