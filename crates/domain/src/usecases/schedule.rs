//! Periodic triggers per platform with overlap prevention and one runner per cluster

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;

use crate::{
    model::{IngestReport, Platform},
    ports::{Clock, JobLeases, PostStore, RawCache},
    usecases::ingest::{IngestError, IngestOrchestrator},
};

/// One row of the schedule table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub platform: Platform,
    pub interval: Duration,
}

impl ScheduleEntry {
    /// Name of the job in the cluster lease table
    pub fn job_name(&self) -> String {
        format!("ingest:{}", self.platform)
    }

    /// Interval slot containing `now`
    pub fn slot(&self, now: OffsetDateTime) -> i64 {
        let secs = i64::try_from(self.interval.as_secs()).unwrap_or(i64::MAX).max(1);
        now.unix_timestamp().div_euclid(secs)
    }
}

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const HOURLY: Duration = Duration::from_secs(60 * 60);

/// X and Bluesky move fast and are polled every 15 minutes; YouTube and DEV.to
/// hourly.
pub fn default_schedule() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry {
            platform: Platform::X,
            interval: FIFTEEN_MINUTES,
        },
        ScheduleEntry {
            platform: Platform::Bluesky,
            interval: FIFTEEN_MINUTES,
        },
        ScheduleEntry {
            platform: Platform::YouTube,
            interval: HOURLY,
        },
        ScheduleEntry {
            platform: Platform::DevTo,
            interval: HOURLY,
        },
    ]
}

/// State of one job in this process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobState {
    pub running: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_started: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_finished: Option<OffsetDateTime>,
    pub runs: u64,
    pub suppressed: u64,
}

/// Scheduler-owned table of running jobs keyed by platform
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Mutex<HashMap<Platform, JobState>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the job running. Returns false, and counts a suppressed trigger,
    /// if it is already running.
    pub fn try_claim(&self, platform: Platform, now: OffsetDateTime) -> bool {
        let mut jobs = self.lock();
        let state = jobs.entry(platform).or_default();
        if state.running {
            state.suppressed += 1;
            return false;
        }
        state.running = true;
        state.last_started = Some(now);
        true
    }

    /// Mark the job idle again
    pub fn release(&self, platform: Platform, now: OffsetDateTime) {
        let mut jobs = self.lock();
        let state = jobs.entry(platform).or_default();
        state.running = false;
        state.last_finished = Some(now);
        state.runs += 1;
    }

    pub fn is_running(&self, platform: Platform) -> bool {
        self.lock().get(&platform).is_some_and(|s| s.running)
    }

    pub fn state(&self, platform: Platform) -> JobState {
        self.lock().get(&platform).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Platform, JobState>> {
        // The critical sections never panic, but recover the map if one did
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Work executed for a scheduled platform
#[async_trait]
pub trait IngestJob: Send + Sync {
    async fn run(&self, platform: Platform) -> Result<IngestReport, IngestError>;
}

#[async_trait]
impl<St, Ca, Cl> IngestJob for IngestOrchestrator<St, Ca, Cl>
where
    St: PostStore + ?Sized,
    Ca: RawCache + ?Sized,
    Cl: Clock + ?Sized,
{
    async fn run(&self, platform: Platform) -> Result<IngestReport, IngestError> {
        self.ingest(platform).await
    }
}

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Identity of this process in the cluster lease table
    pub instance_id: String,
    /// Upper bound on how long a crashed holder can block a job
    pub lease_ttl: time::Duration,
    pub entries: Vec<ScheduleEntry>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            lease_ttl: time::Duration::hours(1),
            entries: default_schedule(),
        }
    }
}

/// Result of one trigger
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The job ran in this process
    Ran(IngestReport),
    /// A previous run of the job is still in progress
    Overlapping,
    /// Another instance already owns this interval or is still running the job
    ClaimedElsewhere,
    /// The platform has no schedule entry
    NotScheduled,
    /// The job could not run
    Failed(String),
}

/// Periodic ingestion scheduler
pub struct Scheduler<J, L, Cl>
where
    J: IngestJob + ?Sized,
    L: JobLeases + ?Sized,
    Cl: Clock + ?Sized,
{
    job: Arc<J>,
    leases: Arc<L>,
    clock: Arc<Cl>,
    table: JobTable,
    config: SchedulerConfig,
}

impl<J, L, Cl> Scheduler<J, L, Cl>
where
    J: IngestJob + ?Sized,
    L: JobLeases + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(job: Arc<J>, leases: Arc<L>, clock: Arc<Cl>, config: SchedulerConfig) -> Self {
        Self {
            job,
            leases,
            clock,
            table: JobTable::new(),
            config,
        }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.config.entries
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    fn entry(&self, platform: Platform) -> Option<ScheduleEntry> {
        self.config
            .entries
            .iter()
            .find(|e| e.platform == platform)
            .copied()
    }

    /// Handle one trigger of a platform's job
    pub async fn trigger(&self, platform: Platform) -> TriggerOutcome {
        let Some(entry) = self.entry(platform) else {
            return TriggerOutcome::NotScheduled;
        };

        let now = self.clock.now();
        if !self.table.try_claim(platform, now) {
            tracing::info!(platform = %platform, "Previous run still in progress, skipping trigger");
            return TriggerOutcome::Overlapping;
        }

        let outcome = self.run_claimed(&entry, now).await;
        self.table.release(platform, self.clock.now());
        outcome
    }

    async fn run_claimed(&self, entry: &ScheduleEntry, now: OffsetDateTime) -> TriggerOutcome {
        let platform = entry.platform;
        let job_name = entry.job_name();
        let holder = self.config.instance_id.as_str();

        match self.leases.claim_slot(&job_name, entry.slot(now), holder).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(platform = %platform, "Interval already claimed by another instance");
                return TriggerOutcome::ClaimedElsewhere;
            }
            Err(e) => {
                tracing::warn!(platform = %platform, error = %e, "Failed to claim interval slot");
                return TriggerOutcome::Failed(e.to_string());
            }
        }

        let expires_at = now + self.config.lease_ttl;
        match self.leases.try_acquire(&job_name, holder, now, expires_at).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(platform = %platform, "Job still running on another instance, skipping trigger");
                return TriggerOutcome::ClaimedElsewhere;
            }
            Err(e) => {
                tracing::warn!(platform = %platform, error = %e, "Failed to acquire job lease");
                return TriggerOutcome::Failed(e.to_string());
            }
        }

        let outcome = match self.job.run(platform).await {
            Ok(report) => TriggerOutcome::Ran(report),
            Err(e) => {
                tracing::error!(platform = %platform, error = %e, "Scheduled ingestion failed");
                TriggerOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = self.leases.release(&job_name, holder).await {
            tracing::warn!(platform = %platform, error = %e, "Failed to release job lease");
        }

        outcome
    }

    /// Trigger every scheduled platform once, concurrently
    pub async fn trigger_all(&self) -> Vec<(Platform, TriggerOutcome)> {
        let mut tasks: FuturesUnordered<_> = self
            .config
            .entries
            .iter()
            .map(|entry| async move { (entry.platform, self.trigger(entry.platform).await) })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(result) = tasks.next().await {
            results.push(result);
        }
        results.sort_by_key(|(platform, _)| *platform);
        results
    }

    /// Run all periodic loops until `shutdown` resolves.
    ///
    /// Each platform ticks on its own interval starting immediately. Ticks missed
    /// while a run is in progress are dropped, not replayed.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let loops: FuturesUnordered<_> = self
            .config
            .entries
            .iter()
            .map(|entry| self.platform_loop(*entry))
            .collect();

        tracing::info!(
            instance_id = %self.config.instance_id,
            jobs = ?self.config.entries.iter().map(|e| (e.platform.as_str(), e.interval.as_secs())).collect::<Vec<_>>(),
            "Scheduler started"
        );

        tokio::select! {
            _ = loops.collect::<Vec<_>>() => {}
            _ = shutdown => {
                tracing::info!("Scheduler shutting down");
            }
        }
    }

    async fn platform_loop(&self, entry: ScheduleEntry) {
        let mut ticker = tokio::time::interval(entry.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.trigger(entry.platform).await {
                TriggerOutcome::Ran(report) => {
                    tracing::debug!(platform = %entry.platform, outcome = ?report.outcome(), "Scheduled run finished");
                }
                other => {
                    tracing::debug!(platform = %entry.platform, outcome = ?other, "Scheduled trigger did not run");
                }
            }
        }
    }
}

/// Default schedule restricted to the given platforms
pub fn schedule_for(platforms: &[Platform]) -> Vec<ScheduleEntry> {
    default_schedule()
        .into_iter()
        .filter(|entry| platforms.contains(&entry.platform))
        .collect()
}
