//! Configuration loading and management

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use skillfeed_adapters::http::{HttpSettings, RetryPolicy};
use skillfeed_adapters::platforms::defaults;
use skillfeed_domain::Platform;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub x: XConfig,

    #[serde(default)]
    pub bluesky: BlueskyConfig,

    #[serde(default)]
    pub youtube: YouTubeConfig,

    #[serde(default)]
    pub devto: DevToConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Identity in the cluster lease table; random per process when unset
    #[serde(default)]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,

    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XConfig {
    #[serde(default = "default_x_bearer_token_env")]
    pub bearer_token_env: String,

    #[serde(default = "default_x_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_bluesky_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    #[serde(default = "default_youtube_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevToConfig {
    #[serde(default = "default_devto_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_devto_base_url")]
    pub base_url: String,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("./skillfeed.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_lease_ttl() -> u64 {
    3600
}

fn default_platforms() -> Vec<String> {
    Platform::INGESTED
        .iter()
        .map(|p| p.as_str().to_string())
        .collect()
}

fn default_x_bearer_token_env() -> String {
    "X_BEARER_TOKEN".to_string()
}

fn default_x_base_url() -> String {
    defaults::X_BASE_URL.to_string()
}

fn default_bluesky_base_url() -> String {
    defaults::BLUESKY_BASE_URL.to_string()
}

fn default_youtube_api_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

fn default_youtube_base_url() -> String {
    defaults::YOUTUBE_BASE_URL.to_string()
}

fn default_devto_api_key_env() -> String {
    "DEVTO_API_KEY".to_string()
}

fn default_devto_base_url() -> String {
    defaults::DEVTO_BASE_URL.to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            instance_id: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl(),
            platforms: default_platforms(),
        }
    }
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            bearer_token_env: default_x_bearer_token_env(),
            base_url: default_x_base_url(),
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            base_url: default_bluesky_base_url(),
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_youtube_api_key_env(),
            base_url: default_youtube_base_url(),
        }
    }
}

impl Default for DevToConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_devto_api_key_env(),
            base_url: default_devto_base_url(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./skillfeed.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("SKILLFEED")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scheduler.platforms"),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// HTTP timeout and retry settings shared by the adapters
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.http.timeout_secs),
            retry: RetryPolicy {
                attempts: self.http.retries.max(1),
                backoff: Duration::from_millis(self.http.backoff_ms),
            },
        }
    }

    /// Platforms to ingest, in configuration order without duplicates
    pub fn enabled_platforms(&self) -> Result<Vec<Platform>> {
        let mut platforms = Vec::new();
        for name in &self.scheduler.platforms {
            let platform: Platform = name
                .parse()
                .with_context(|| format!("Invalid platform in scheduler.platforms: {}", name))?;
            if platform == Platform::Community {
                anyhow::bail!("Platform 'community' has no ingestion adapter");
            }
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        Ok(platforms)
    }

    pub fn cache_ttl(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.cache.ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn lease_ttl(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.scheduler.lease_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# skillfeed configuration
# Every key can be overridden with SKILLFEED__<SECTION>__<KEY>,
# e.g. SKILLFEED__GENERAL__DATABASE_PATH=/var/lib/skillfeed.sqlite

[general]
database_path = "./skillfeed.sqlite"
log_level = "info"
# Identity of this process when several instances share the database
# instance_id = "worker-1"

[http]
timeout_secs = 30
retries = 3
backoff_ms = 100

[cache]
# How long a fetched snapshot can stand in for a failed fetch
ttl_secs = 3600

[scheduler]
lease_ttl_secs = 3600
platforms = ["x", "bluesky", "youtube", "devto"]

[x]
bearer_token_env = "X_BEARER_TOKEN"
base_url = "https://api.twitter.com"

[bluesky]
base_url = "https://public.api.bsky.app"

[youtube]
api_key_env = "YOUTUBE_API_KEY"
base_url = "https://www.googleapis.com/youtube/v3"

[devto]
# Optional; requests are sent anonymously without it
api_key_env = "DEVTO_API_KEY"
base_url = "https://dev.to/api"
"#
        .to_string()
    }
}

/// Read a credential from the named environment variable. Missing or empty
/// values disable the credential.
pub fn load_secret(env_var: &str) -> Option<SecretString> {
    if env_var.trim().is_empty() {
        return None;
    }

    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::new(value.into())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses_to_defaults() {
        let parsed: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                &AppConfig::example_toml(),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let defaults = AppConfig::default();
        assert_eq!(parsed.general.database_path, defaults.general.database_path);
        assert_eq!(parsed.http.retries, 3);
        assert_eq!(parsed.cache.ttl_secs, 3600);
        assert_eq!(parsed.scheduler.platforms, defaults.scheduler.platforms);
        assert_eq!(parsed.x.base_url, defaults.x.base_url);
        assert_eq!(parsed.youtube.base_url, defaults.youtube.base_url);
    }

    #[test]
    fn test_enabled_platforms() {
        let mut config = AppConfig::default();
        assert_eq!(config.enabled_platforms().unwrap(), Platform::INGESTED.to_vec());

        config.scheduler.platforms = vec!["devto".into(), "twitter".into(), "x".into()];
        assert_eq!(
            config.enabled_platforms().unwrap(),
            vec![Platform::DevTo, Platform::X]
        );

        config.scheduler.platforms = vec!["community".into()];
        assert!(config.enabled_platforms().is_err());

        config.scheduler.platforms = vec!["mastodon".into()];
        assert!(config.enabled_platforms().is_err());
    }

    #[test]
    fn test_http_settings() {
        let mut config = AppConfig::default();
        config.http.retries = 0;
        let settings = config.http_settings();
        assert_eq!(settings.retry.attempts, 1);
        assert_eq!(settings.retry.backoff, Duration::from_millis(100));
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_load_secret_empty_is_none() {
        assert!(load_secret("").is_none());
        assert!(load_secret("SKILLFEED_TEST_SURELY_UNSET_VARIABLE").is_none());
    }
}
