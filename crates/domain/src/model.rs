//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Platform a post originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    Bluesky,
    YouTube,
    DevTo,
    /// User-submitted posts; never ingested by an adapter
    Community,
}

impl Platform {
    /// Platforms with an ingestion adapter
    pub const INGESTED: [Platform; 4] = [
        Platform::X,
        Platform::Bluesky,
        Platform::YouTube,
        Platform::DevTo,
    ];

    /// Stable identifier used in storage, config and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Bluesky => "bluesky",
            Platform::YouTube => "youtube",
            Platform::DevTo => "devto",
            Platform::Community => "community",
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Platform::X => "X",
            Platform::Bluesky => "Bluesky",
            Platform::YouTube => "YouTube",
            Platform::DevTo => "DEV.to",
            Platform::Community => "Community",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown platform name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" | "twitter" => Ok(Platform::X),
            "bluesky" | "bsky" => Ok(Platform::Bluesky),
            "youtube" => Ok(Platform::YouTube),
            "devto" | "dev.to" => Ok(Platform::DevTo),
            "community" => Ok(Platform::Community),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

/// A fetched item before normalization. Never persisted as a post, but
/// serialized into the stale-data cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Platform-native id, used to dedup across requests
    pub native_id: String,
    /// Text the relevance filter runs over
    pub content: String,
    /// Platform-specific payload consumed by `normalize`
    pub payload: serde_json::Value,
}

/// Raw items of the last successful fetch and when that fetch happened
#[derive(Debug, Clone, PartialEq)]
pub struct CachedItems {
    pub items: Vec<RawItem>,
    pub fetched_at: OffsetDateTime,
}

/// Interaction counters reported by a platform.
///
/// Platforms without a repost concept (YouTube, DEV.to) leave `reposts` at zero;
/// DEV.to reactions count as likes and comments count as replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngagementCounts {
    pub likes: u64,
    pub reposts: u64,
    pub replies: u64,
}

impl EngagementCounts {
    pub const LIKE_WEIGHT: u64 = 1;
    pub const REPOST_WEIGHT: u64 = 2;
    pub const REPLY_WEIGHT: u64 = 3;

    /// Weighted engagement score
    pub fn score(&self) -> u64 {
        (self.likes.saturating_mul(Self::LIKE_WEIGHT))
            .saturating_add(self.reposts.saturating_mul(Self::REPOST_WEIGHT))
            .saturating_add(self.replies.saturating_mul(Self::REPLY_WEIGHT))
    }
}

/// Canonical fields produced by an adapter's `normalize`.
///
/// Moderation flags are absent on purpose: ingestion cannot set them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPost {
    pub platform: Platform,
    pub platform_id: String,
    pub author_name: String,
    pub author_handle: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub media_url: Option<String>,
    pub post_url: String,
    pub engagement_score: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// A persisted post as read back by feed consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: Uuid,
    pub platform: Platform,
    pub platform_id: String,
    pub author_name: String,
    pub author_handle: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub media_url: Option<String>,
    pub post_url: String,
    pub engagement_score: u64,
    pub is_featured: bool,
    pub is_hidden: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

impl SocialPost {
    /// Build a fresh record with moderation flags cleared
    pub fn from_normalized(id: Uuid, post: NormalizedPost) -> Self {
        Self {
            id,
            platform: post.platform,
            platform_id: post.platform_id,
            author_name: post.author_name,
            author_handle: post.author_handle,
            author_avatar_url: post.author_avatar_url,
            content: post.content,
            media_url: post.media_url,
            post_url: post.post_url,
            engagement_score: post.engagement_score,
            is_featured: false,
            is_hidden: false,
            published_at: post.published_at,
            fetched_at: post.fetched_at,
        }
    }

    /// Overwrite every ingested field, keeping id and moderation flags
    pub fn apply_update(&mut self, post: NormalizedPost) {
        self.author_name = post.author_name;
        self.author_handle = post.author_handle;
        self.author_avatar_url = post.author_avatar_url;
        self.content = post.content;
        self.media_url = post.media_url;
        self.post_url = post.post_url;
        self.engagement_score = post.engagement_score;
        self.published_at = post.published_at;
        self.fetched_at = post.fetched_at;
    }
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// True when no record existed for the key
    pub created: bool,
}

/// Moderation state set by an external moderator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moderation {
    pub is_featured: bool,
    pub is_hidden: bool,
}

/// Feed query used by readers of the post store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub platform: Option<Platform>,
    pub featured_only: bool,
    pub include_hidden: bool,
    pub limit: usize,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            platform: None,
            featured_only: false,
            include_hidden: false,
            limit: 50,
        }
    }
}

impl FeedQuery {
    /// Whether a post matches the filter part of the query
    pub fn matches(&self, post: &SocialPost) -> bool {
        if !self.include_hidden && post.is_hidden {
            return false;
        }
        if self.featured_only && !post.is_featured {
            return false;
        }
        match self.platform {
            Some(platform) => post.platform == platform,
            None => true,
        }
    }
}

/// Phases an ingestion run moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Fetching,
    StaleFallback,
    Filtering,
    Persisting,
    Done,
    Skipped,
}

/// Where the items of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Stale,
}

/// Summary of one ingestion run for one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub platform: Platform,
    /// Every phase entered, in order; ends in `Done` or `Skipped`
    pub phases: Vec<IngestPhase>,
    pub source: Option<DataSource>,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub filtered: usize,
    pub failed: usize,
}

impl IngestReport {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            phases: vec![],
            source: None,
            fetched: 0,
            created: 0,
            updated: 0,
            filtered: 0,
            failed: 0,
        }
    }

    /// Final phase of the run
    pub fn outcome(&self) -> Option<IngestPhase> {
        self.phases.last().copied()
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome() == Some(IngestPhase::Skipped)
    }

    pub fn used_stale(&self) -> bool {
        self.source == Some(DataSource::Stale)
    }
}
