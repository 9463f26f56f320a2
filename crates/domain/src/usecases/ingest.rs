//! Ingestion use case - drives fetch, filter, normalize and persist for one platform

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    filter::ContentFilter,
    model::{CachedItems, DataSource, IngestPhase, IngestReport, Platform, RawItem},
    ports::{Clock, PlatformAdapter, PostStore, RawCache},
};

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// How long a fetched raw snapshot stays usable as stale fallback
    pub cache_ttl: time::Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_ttl: time::Duration::hours(1),
        }
    }
}

/// Adapters indexed by the platform they serve
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Registered platforms in a stable order
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }
}

/// Errors from the orchestrator. Fetch and persistence failures are absorbed
/// into the report; only wiring mistakes surface here.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No adapter registered for platform {0}")]
    UnknownPlatform(Platform),
}

/// Ingestion orchestrator
pub struct IngestOrchestrator<St, Ca, Cl>
where
    St: PostStore + ?Sized,
    Ca: RawCache + ?Sized,
    Cl: Clock + ?Sized,
{
    adapters: AdapterRegistry,
    filter: Arc<ContentFilter>,
    store: Arc<St>,
    cache: Arc<Ca>,
    clock: Arc<Cl>,
    config: IngestConfig,
}

impl<St, Ca, Cl> IngestOrchestrator<St, Ca, Cl>
where
    St: PostStore + ?Sized,
    Ca: RawCache + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        adapters: AdapterRegistry,
        filter: Arc<ContentFilter>,
        store: Arc<St>,
        cache: Arc<Ca>,
        clock: Arc<Cl>,
        config: IngestConfig,
    ) -> Self {
        Self {
            adapters,
            filter,
            store,
            cache,
            clock,
            config,
        }
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.platforms()
    }

    /// Run one fetch, filter, persist cycle for a platform
    pub async fn ingest(&self, platform: Platform) -> Result<IngestReport, IngestError> {
        let adapter = self
            .adapters
            .get(platform)
            .ok_or(IngestError::UnknownPlatform(platform))?;

        let mut report = IngestReport::new(platform);

        tracing::info!(platform = %platform, "Fetching social posts");
        report.phases.push(IngestPhase::Fetching);

        let snapshot = match self.fetch_live(adapter.as_ref()).await {
            Some(snapshot) => {
                report.source = Some(DataSource::Live);
                snapshot
            }
            None => {
                report.phases.push(IngestPhase::StaleFallback);
                match self.read_stale(platform).await {
                    Some(snapshot) => {
                        tracing::info!(
                            platform = %platform,
                            stale_count = snapshot.items.len(),
                            fetched_at = %snapshot.fetched_at,
                            "Using stale cached data for platform"
                        );
                        report.source = Some(DataSource::Stale);
                        snapshot
                    }
                    None => {
                        tracing::warn!(
                            platform = %platform,
                            "No stale data available for platform, skipping sync"
                        );
                        report.phases.push(IngestPhase::Skipped);
                        return Ok(report);
                    }
                }
            }
        };

        let CachedItems { items, fetched_at } = snapshot;
        report.fetched = items.len();

        report.phases.push(IngestPhase::Filtering);
        let (kept, dropped) = self.filter_items(adapter.as_ref(), items);
        report.filtered = dropped;

        report.phases.push(IngestPhase::Persisting);
        self.persist(adapter.as_ref(), &kept, fetched_at, &mut report)
            .await;

        report.phases.push(IngestPhase::Done);

        tracing::info!(
            platform = %platform,
            source = ?report.source,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            filtered = report.filtered,
            failed = report.failed,
            "Social posts sync complete"
        );

        Ok(report)
    }

    /// Live fetch. `None` means the run must fall back to stale data, either
    /// because the adapter raised an error or because it returned nothing.
    async fn fetch_live(&self, adapter: &dyn PlatformAdapter) -> Option<CachedItems> {
        let platform = adapter.platform();

        let items = match adapter.fetch().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    platform = %platform,
                    policy = adapter.failure_policy().as_str(),
                    error = %e,
                    "Failed to fetch social posts, serving stale data"
                );
                return None;
            }
        };

        if items.is_empty() {
            tracing::debug!(platform = %platform, "Fetch returned no items");
            return None;
        }

        let fetched_at = self.clock.now();
        let expires_at = fetched_at + self.config.cache_ttl;
        if let Err(e) = self
            .cache
            .put(platform, &items, fetched_at, expires_at)
            .await
        {
            tracing::warn!(platform = %platform, error = %e, "Failed to cache raw items");
        }

        Some(CachedItems { items, fetched_at })
    }

    async fn read_stale(&self, platform: Platform) -> Option<CachedItems> {
        match self.cache.get(platform, self.clock.now()).await {
            Ok(Some(snapshot)) if !snapshot.items.is_empty() => Some(snapshot),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(platform = %platform, error = %e, "Failed to read raw cache");
                None
            }
        }
    }

    /// Split items into kept and a dropped count. An item is dropped only when
    /// both the adapter's filter and the shared filter reject it.
    fn filter_items(
        &self,
        adapter: &dyn PlatformAdapter,
        items: Vec<RawItem>,
    ) -> (Vec<RawItem>, usize) {
        let total = items.len();
        let kept: Vec<RawItem> = items
            .into_iter()
            .filter(|item| adapter.filter(item) || self.filter.passes(&item.content))
            .collect();
        let dropped = total - kept.len();
        (kept, dropped)
    }

    /// Normalize and upsert each item. `fetched_at` is the time of the fetch
    /// that produced the items, which predates `now` on the stale path.
    async fn persist(
        &self,
        adapter: &dyn PlatformAdapter,
        items: &[RawItem],
        fetched_at: time::OffsetDateTime,
        report: &mut IngestReport,
    ) {
        let platform = adapter.platform();

        for item in items {
            let normalized = match adapter.normalize(item, fetched_at) {
                Ok(post) => post,
                Err(e) => {
                    tracing::warn!(
                        platform = %platform,
                        native_id = %item.native_id,
                        error = %e,
                        "Failed to normalize item, skipping"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            match self.store.upsert(&normalized).await {
                Ok(outcome) if outcome.created => report.created += 1,
                Ok(_) => report.updated += 1,
                Err(e) => {
                    tracing::error!(
                        platform = %platform,
                        platform_id = %normalized.platform_id,
                        error = %e,
                        "Failed to persist post, skipping"
                    );
                    report.failed += 1;
                }
            }
        }
    }
}
