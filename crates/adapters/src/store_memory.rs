//! In-memory stores for testing and offline mode

use async_trait::async_trait;
use skillfeed_domain::{
    CachedItems, FeedQuery, JobLeases, Moderation, NormalizedPost, Platform, PostStore, RawCache, RawItem,
    SocialPost, StoreError, UpsertOutcome,
};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

type PostKey = (Platform, String);

/// In-memory implementation of every store port
pub struct InMemoryStore {
    posts: RwLock<HashMap<PostKey, SocialPost>>,
    cache: RwLock<HashMap<Platform, (CachedItems, OffsetDateTime)>>,
    slots: RwLock<HashSet<(String, i64)>>,
    leases: RwLock<HashMap<String, (String, OffsetDateTime)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            slots: RwLock::new(HashSet::new()),
            leases: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored posts, hidden ones included
    pub fn len(&self) -> usize {
        self.posts.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn upsert(&self, post: &NormalizedPost) -> Result<UpsertOutcome, StoreError> {
        let mut posts = self.posts.write().map_err(lock_err)?;
        let key = (post.platform, post.platform_id.clone());

        match posts.get_mut(&key) {
            Some(existing) => {
                existing.apply_update(post.clone());
                Ok(UpsertOutcome { created: false })
            }
            None => {
                posts.insert(key, SocialPost::from_normalized(Uuid::new_v4(), post.clone()));
                Ok(UpsertOutcome { created: true })
            }
        }
    }

    async fn get(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<SocialPost>, StoreError> {
        let posts = self.posts.read().map_err(lock_err)?;
        Ok(posts.get(&(platform, platform_id.to_string())).cloned())
    }

    async fn list(&self, query: &FeedQuery) -> Result<Vec<SocialPost>, StoreError> {
        let posts = self.posts.read().map_err(lock_err)?;
        let mut matching: Vec<SocialPost> = posts
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        matching.truncate(query.limit);
        Ok(matching)
    }

    async fn set_moderation(
        &self,
        platform: Platform,
        platform_id: &str,
        moderation: Moderation,
    ) -> Result<(), StoreError> {
        let mut posts = self.posts.write().map_err(lock_err)?;
        let post = posts
            .get_mut(&(platform, platform_id.to_string()))
            .ok_or_else(|| StoreError::NotFound(format!("{}:{}", platform, platform_id)))?;

        post.is_featured = moderation.is_featured;
        post.is_hidden = moderation.is_hidden;
        Ok(())
    }
}

#[async_trait]
impl RawCache for InMemoryStore {
    async fn put(
        &self,
        platform: Platform,
        items: &[RawItem],
        fetched_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut cache = self.cache.write().map_err(lock_err)?;
        let snapshot = CachedItems {
            items: items.to_vec(),
            fetched_at,
        };
        cache.insert(platform, (snapshot, expires_at));
        Ok(())
    }

    async fn get(
        &self,
        platform: Platform,
        now: OffsetDateTime,
    ) -> Result<Option<CachedItems>, StoreError> {
        let cache = self.cache.read().map_err(lock_err)?;
        Ok(cache
            .get(&platform)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(snapshot, _)| snapshot.clone()))
    }
}

#[async_trait]
impl JobLeases for InMemoryStore {
    async fn claim_slot(&self, job: &str, slot: i64, _holder: &str) -> Result<bool, StoreError> {
        let mut slots = self.slots.write().map_err(lock_err)?;
        let claimed = slots.insert((job.to_string(), slot));
        let oldest = slot.saturating_sub(1);
        slots.retain(|(j, s)| j != job || *s >= oldest);
        Ok(claimed)
    }

    async fn try_acquire(
        &self,
        job: &str,
        holder: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut leases = self.leases.write().map_err(lock_err)?;

        if let Some((current, until)) = leases.get(job) {
            if current != holder && *until > now {
                return Ok(false);
            }
        }

        leases.insert(job.to_string(), (holder.to_string(), expires_at));
        Ok(true)
    }

    async fn release(&self, job: &str, holder: &str) -> Result<(), StoreError> {
        let mut leases = self.leases.write().map_err(lock_err)?;
        if leases.get(job).is_some_and(|(current, _)| current == holder) {
            leases.remove(job);
        }
        Ok(())
    }
}
