//! Builds adapters, stores and use cases from configuration

use anyhow::{Context, Result};
use skillfeed_adapters::platforms::{BlueskyAdapter, DevToAdapter, XAdapter, YouTubeAdapter};
use skillfeed_adapters::store::SqliteStore;
use skillfeed_domain::usecases::{
    AdapterRegistry, IngestConfig, IngestOrchestrator, Scheduler, SchedulerConfig, schedule_for,
};
use skillfeed_domain::{ContentFilter, Platform, PlatformAdapter, SystemClock};
use std::sync::Arc;

use crate::config::{AppConfig, load_secret};

pub type Orchestrator = IngestOrchestrator<SqliteStore, SqliteStore, SystemClock>;
pub type AppScheduler = Scheduler<Orchestrator, SqliteStore, SystemClock>;

/// Fully wired application
pub struct App {
    pub store: Arc<SqliteStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub platforms: Vec<Platform>,
}

impl App {
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let platforms = config.enabled_platforms()?;

        let store = Arc::new(
            SqliteStore::new(&config.general.database_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to open database: {}",
                        config.general.database_path.display()
                    )
                })?,
        );

        let filter = Arc::new(ContentFilter::default());
        let registry = build_registry(config, &platforms, &filter);

        let orchestrator = Arc::new(IngestOrchestrator::new(
            registry,
            filter,
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::new(SystemClock),
            IngestConfig {
                cache_ttl: config.cache_ttl(),
            },
        ));

        Ok(Self {
            store,
            orchestrator,
            platforms,
        })
    }

    pub fn scheduler(&self, config: &AppConfig) -> AppScheduler {
        let mut scheduler_config = SchedulerConfig {
            lease_ttl: config.lease_ttl(),
            entries: schedule_for(&self.platforms),
            ..Default::default()
        };
        if let Some(instance_id) = &config.general.instance_id {
            scheduler_config.instance_id = instance_id.clone();
        }

        Scheduler::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.store),
            Arc::new(SystemClock),
            scheduler_config,
        )
    }
}

/// Adapter for each enabled platform
pub fn build_registry(
    config: &AppConfig,
    platforms: &[Platform],
    filter: &Arc<ContentFilter>,
) -> AdapterRegistry {
    let http = config.http_settings();
    let mut registry = AdapterRegistry::new();

    for platform in platforms {
        let adapter: Arc<dyn PlatformAdapter> = match platform {
            Platform::X => Arc::new(
                XAdapter::with_base_url(
                    load_secret(&config.x.bearer_token_env),
                    Arc::clone(filter),
                    config.x.base_url.clone(),
                )
                .with_http(http),
            ),
            Platform::Bluesky => Arc::new(
                BlueskyAdapter::with_base_url(Arc::clone(filter), config.bluesky.base_url.clone())
                    .with_http(http),
            ),
            Platform::YouTube => Arc::new(
                YouTubeAdapter::with_base_url(
                    load_secret(&config.youtube.api_key_env),
                    Arc::clone(filter),
                    config.youtube.base_url.clone(),
                )
                .with_http(http),
            ),
            Platform::DevTo => Arc::new(
                DevToAdapter::with_base_url(
                    load_secret(&config.devto.api_key_env),
                    Arc::clone(filter),
                    config.devto.base_url.clone(),
                )
                .with_http(http),
            ),
            Platform::Community => continue,
        };
        registry.register(adapter);
    }

    registry
}
