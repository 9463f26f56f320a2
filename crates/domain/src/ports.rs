//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    CachedItems, FeedQuery, Moderation, NormalizedPost, Platform, RawItem, SocialPost,
    UpsertOutcome,
};

/// Error type for platform fetch operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }
}

/// Error type for normalizing a raw item
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Malformed payload: {0}")]
    Payload(String),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// What an adapter does when its fetch still fails after retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and return an empty result
    Swallow,
    /// Return the error to the orchestrator
    Propagate,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Swallow => "swallow",
            FailurePolicy::Propagate => "propagate",
        }
    }
}

/// Port for one social platform
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Fetch candidate items with the adapter's fixed query.
    ///
    /// Adapters with `FailurePolicy::Swallow` return `Ok(vec![])` on failure.
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError>;

    /// Map a raw item to canonical post fields; `now` becomes `fetched_at` and the
    /// fallback publish time
    fn normalize(&self, item: &RawItem, now: OffsetDateTime)
    -> Result<NormalizedPost, NormalizeError>;

    /// Adapter-level relevance check
    fn filter(&self, item: &RawItem) -> bool;

    /// Platform served by this adapter
    fn platform(&self) -> Platform;

    /// Failure handling of `fetch`
    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Swallow
    }
}

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the durable canonical post store
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert or update the post keyed by (platform, platform_id).
    ///
    /// Updates overwrite every ingested field and keep moderation flags.
    async fn upsert(&self, post: &NormalizedPost) -> Result<UpsertOutcome, StoreError>;

    /// Look up a post by its identity
    async fn get(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<SocialPost>, StoreError>;

    /// List posts, newest first
    async fn list(&self, query: &FeedQuery) -> Result<Vec<SocialPost>, StoreError>;

    /// Set moderation flags (used by the external moderator)
    async fn set_moderation(
        &self,
        platform: Platform,
        platform_id: &str,
        moderation: Moderation,
    ) -> Result<(), StoreError>;
}

/// Port for the short-lived raw snapshot used as stale fallback
#[async_trait]
pub trait RawCache: Send + Sync {
    /// Replace the snapshot for a platform
    async fn put(
        &self,
        platform: Platform,
        items: &[RawItem],
        fetched_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Read the snapshot if it has not expired at `now`
    async fn get(
        &self,
        platform: Platform,
        now: OffsetDateTime,
    ) -> Result<Option<CachedItems>, StoreError>;
}

/// Port for cluster-wide coordination of scheduled jobs
#[async_trait]
pub trait JobLeases: Send + Sync {
    /// Claim an interval slot of a job. Exactly one holder wins a given slot.
    async fn claim_slot(&self, job: &str, slot: i64, holder: &str) -> Result<bool, StoreError>;

    /// Take the running lease of a job unless another holder has an unexpired one
    async fn try_acquire(
        &self,
        job: &str,
        holder: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Drop the running lease if still held by `holder`
    async fn release(&self, job: &str, holder: &str) -> Result<(), StoreError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
