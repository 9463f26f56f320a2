//! SQLite store: canonical posts, raw snapshot cache and job leases

use async_trait::async_trait;
use skillfeed_domain::{
    CachedItems, FeedQuery, JobLeases, Moderation, NormalizedPost, Platform, PostStore, RawCache, RawItem,
    SocialPost, StoreError, UpsertOutcome,
};
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions, sqlite::SqliteRow};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// SQLite-backed store shared by every instance pointing at the same file
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database, creating it and its tables if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Cheap connectivity probe
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS social_posts (
                id TEXT PRIMARY KEY,
                platform TEXT NOT NULL,
                platform_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_handle TEXT NOT NULL,
                author_avatar_url TEXT,
                content TEXT NOT NULL,
                media_url TEXT,
                post_url TEXT NOT NULL,
                engagement_score INTEGER NOT NULL DEFAULT 0,
                is_featured INTEGER NOT NULL DEFAULT 0,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                published_at TEXT NOT NULL,
                published_unix INTEGER NOT NULL,
                fetched_at TEXT NOT NULL,
                fetch_count INTEGER NOT NULL DEFAULT 1,
                UNIQUE(platform, platform_id)
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_social_posts_published
            ON social_posts(published_unix DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS raw_cache (
                platform TEXT PRIMARY KEY,
                items TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                expires_unix INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_slots (
                job TEXT NOT NULL,
                slot INTEGER NOT NULL,
                holder TEXT NOT NULL,
                PRIMARY KEY(job, slot)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_leases (
                job TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                acquired_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                expires_unix INTEGER NOT NULL
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(())
    }
}

fn format_ts(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_ts(s: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Engagement is unsigned in the domain but SQLite integers are signed
fn score_to_db(score: u64) -> i64 {
    i64::try_from(score).unwrap_or(i64::MAX)
}

const POST_COLUMNS: &str = "id, platform, platform_id, author_name, author_handle, \
    author_avatar_url, content, media_url, post_url, engagement_score, is_featured, is_hidden, \
    published_at, fetched_at";

fn post_from_row(row: &SqliteRow) -> Result<SocialPost, StoreError> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let platform: String = row.try_get("platform").map_err(db_err)?;
    let score: i64 = row.try_get("engagement_score").map_err(db_err)?;
    let published_at: String = row.try_get("published_at").map_err(db_err)?;
    let fetched_at: String = row.try_get("fetched_at").map_err(db_err)?;

    Ok(SocialPost {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Serialization(e.to_string()))?,
        platform: platform
            .parse::<Platform>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?,
        platform_id: row.try_get("platform_id").map_err(db_err)?,
        author_name: row.try_get("author_name").map_err(db_err)?,
        author_handle: row.try_get("author_handle").map_err(db_err)?,
        author_avatar_url: row.try_get("author_avatar_url").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        media_url: row.try_get("media_url").map_err(db_err)?,
        post_url: row.try_get("post_url").map_err(db_err)?,
        engagement_score: u64::try_from(score).unwrap_or(0),
        is_featured: row.try_get("is_featured").map_err(db_err)?,
        is_hidden: row.try_get("is_hidden").map_err(db_err)?,
        published_at: parse_ts(&published_at)?,
        fetched_at: parse_ts(&fetched_at)?,
    })
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn upsert(&self, post: &NormalizedPost) -> Result<UpsertOutcome, StoreError> {
        // Moderation flags are absent from the update list so they survive re-ingestion
        let (fetch_count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO social_posts
            (id, platform, platform_id, author_name, author_handle, author_avatar_url, content,
             media_url, post_url, engagement_score, published_at, published_unix, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform, platform_id) DO UPDATE SET
                author_name = excluded.author_name,
                author_handle = excluded.author_handle,
                author_avatar_url = excluded.author_avatar_url,
                content = excluded.content,
                media_url = excluded.media_url,
                post_url = excluded.post_url,
                engagement_score = excluded.engagement_score,
                published_at = excluded.published_at,
                published_unix = excluded.published_unix,
                fetched_at = excluded.fetched_at,
                fetch_count = social_posts.fetch_count + 1
            RETURNING fetch_count
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(post.platform.as_str())
        .bind(&post.platform_id)
        .bind(&post.author_name)
        .bind(&post.author_handle)
        .bind(&post.author_avatar_url)
        .bind(&post.content)
        .bind(&post.media_url)
        .bind(&post.post_url)
        .bind(score_to_db(post.engagement_score))
        .bind(format_ts(post.published_at)?)
        .bind(post.published_at.unix_timestamp())
        .bind(format_ts(post.fetched_at)?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(UpsertOutcome {
            created: fetch_count == 1,
        })
    }

    async fn get(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<SocialPost>, StoreError> {
        let sql = format!(
            "SELECT {} FROM social_posts WHERE platform = ? AND platform_id = ?",
            POST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(platform.as_str())
            .bind(platform_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list(&self, query: &FeedQuery) -> Result<Vec<SocialPost>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM social_posts
            WHERE (? OR is_hidden = 0)
              AND (? = 0 OR is_featured = 1)
              AND (? IS NULL OR platform = ?)
            ORDER BY published_unix DESC, id
            LIMIT ?
            "#,
            POST_COLUMNS
        );
        let platform = query.platform.map(|p| p.as_str());

        let rows = sqlx::query(&sql)
            .bind(query.include_hidden)
            .bind(query.featured_only)
            .bind(platform)
            .bind(platform)
            .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(post_from_row).collect()
    }

    async fn set_moderation(
        &self,
        platform: Platform,
        platform_id: &str,
        moderation: Moderation,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE social_posts SET is_featured = ?, is_hidden = ? WHERE platform = ? AND platform_id = ?",
        )
        .bind(moderation.is_featured)
        .bind(moderation.is_hidden)
        .bind(platform.as_str())
        .bind(platform_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{}:{}", platform, platform_id)));
        }

        Ok(())
    }
}

#[async_trait]
impl RawCache for SqliteStore {
    async fn put(
        &self,
        platform: Platform,
        items: &[RawItem],
        fetched_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let items =
            serde_json::to_string(items).map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO raw_cache (platform, items, fetched_at, expires_at, expires_unix)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(platform) DO UPDATE SET
                items = excluded.items,
                fetched_at = excluded.fetched_at,
                expires_at = excluded.expires_at,
                expires_unix = excluded.expires_unix
            "#,
        )
        .bind(platform.as_str())
        .bind(&items)
        .bind(format_ts(fetched_at)?)
        .bind(format_ts(expires_at)?)
        .bind(expires_at.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get(
        &self,
        platform: Platform,
        now: OffsetDateTime,
    ) -> Result<Option<CachedItems>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT items, fetched_at FROM raw_cache WHERE platform = ? AND expires_unix > ?",
        )
        .bind(platform.as_str())
        .bind(now.unix_timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some((items, fetched_at)) = row else {
            return Ok(None);
        };

        Ok(Some(CachedItems {
            items: serde_json::from_str(&items)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            fetched_at: parse_ts(&fetched_at)?,
        }))
    }
}

#[async_trait]
impl JobLeases for SqliteStore {
    async fn claim_slot(&self, job: &str, slot: i64, holder: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO job_slots (job, slot, holder) VALUES (?, ?, ?)")
                .bind(job)
                .bind(slot)
                .bind(holder)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        // Only the current and previous slot can still be contended
        sqlx::query("DELETE FROM job_slots WHERE job = ? AND slot < ?")
            .bind(job)
            .bind(slot.saturating_sub(1))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_acquire(
        &self,
        job: &str,
        holder: &str,
        now: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_leases (job, holder, acquired_at, expires_at, expires_unix)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(job) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at,
                expires_unix = excluded.expires_unix
            WHERE job_leases.holder = excluded.holder OR job_leases.expires_unix <= ?
            "#,
        )
        .bind(job)
        .bind(holder)
        .bind(format_ts(now)?)
        .bind(format_ts(expires_at)?)
        .bind(expires_at.unix_timestamp())
        .bind(now.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, job: &str, holder: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM job_leases WHERE job = ? AND holder = ?")
            .bind(job)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    fn post(platform: Platform, id: &str, content: &str, published: i64) -> NormalizedPost {
        NormalizedPost {
            platform,
            platform_id: id.to_string(),
            author_name: "Author".to_string(),
            author_handle: "author".to_string(),
            author_avatar_url: None,
            content: content.to_string(),
            media_url: Some("https://img.example/1.png".to_string()),
            post_url: format!("https://example.com/{}", id),
            engagement_score: 7,
            published_at: ts(published),
            fetched_at: ts(1_700_000_000),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = SqliteStore::in_memory().await.unwrap();

        let first = store
            .upsert(&post(Platform::X, "1", "first", 100))
            .await
            .unwrap();
        assert!(first.created);

        let original = PostStore::get(&store, Platform::X, "1").await.unwrap().unwrap();

        let mut updated = post(Platform::X, "1", "second", 100);
        updated.fetched_at = ts(1_700_000_900);
        updated.engagement_score = 99;
        updated.media_url = None;
        let second = store.upsert(&updated).await.unwrap();
        assert!(!second.created);

        let stored = PostStore::get(&store, Platform::X, "1").await.unwrap().unwrap();
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.content, "second");
        assert_eq!(stored.engagement_score, 99);
        assert!(stored.media_url.is_none());
        assert_eq!(stored.fetched_at, ts(1_700_000_900));

        let all = store
            .list(&FeedQuery {
                include_hidden: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_same_id_on_other_platform_is_distinct() {
        let store = SqliteStore::in_memory().await.unwrap();

        assert!(store.upsert(&post(Platform::X, "1", "a", 1)).await.unwrap().created);
        assert!(
            store
                .upsert(&post(Platform::DevTo, "1", "b", 2))
                .await
                .unwrap()
                .created
        );
    }

    #[tokio::test]
    async fn test_moderation_survives_upsert() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert(&post(Platform::Bluesky, "at://p", "c", 1))
            .await
            .unwrap();

        store
            .set_moderation(
                Platform::Bluesky,
                "at://p",
                Moderation {
                    is_featured: true,
                    is_hidden: true,
                },
            )
            .await
            .unwrap();

        store
            .upsert(&post(Platform::Bluesky, "at://p", "c2", 1))
            .await
            .unwrap();

        let stored = PostStore::get(&store, Platform::Bluesky, "at://p").await.unwrap().unwrap();
        assert!(stored.is_featured);
        assert!(stored.is_hidden);
        assert_eq!(stored.content, "c2");
    }

    #[tokio::test]
    async fn test_set_moderation_unknown_post() {
        let store = SqliteStore::in_memory().await.unwrap();
        let result = store
            .set_moderation(Platform::X, "missing", Moderation::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert(&post(Platform::X, "old", "o", 100)).await.unwrap();
        store.upsert(&post(Platform::X, "new", "n", 300)).await.unwrap();
        store
            .upsert(&post(Platform::YouTube, "vid", "v", 200))
            .await
            .unwrap();
        store
            .set_moderation(
                Platform::X,
                "old",
                Moderation {
                    is_featured: false,
                    is_hidden: true,
                },
            )
            .await
            .unwrap();
        store
            .set_moderation(
                Platform::YouTube,
                "vid",
                Moderation {
                    is_featured: true,
                    is_hidden: false,
                },
            )
            .await
            .unwrap();

        let visible = store.list(&FeedQuery::default()).await.unwrap();
        let ids: Vec<_> = visible.iter().map(|p| p.platform_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "vid"]);

        let featured = store
            .list(&FeedQuery {
                featured_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].platform, Platform::YouTube);

        let x_only = store
            .list(&FeedQuery {
                platform: Some(Platform::X),
                include_hidden: true,
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(x_only.len(), 1);
        assert_eq!(x_only[0].platform_id, "new");
    }

    #[tokio::test]
    async fn test_raw_cache_expiry() {
        let store = SqliteStore::in_memory().await.unwrap();
        let items = vec![RawItem {
            native_id: "1".to_string(),
            content: "laravel ai".to_string(),
            payload: serde_json::json!({"k": [1, 2]}),
        }];

        store
            .put(Platform::Bluesky, &items, ts(1_000), ts(1_000 + 3_600))
            .await
            .unwrap();

        let cached = RawCache::get(&store, Platform::Bluesky, ts(1_200))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.items, items);
        assert_eq!(cached.fetched_at, ts(1_000));

        let expired = RawCache::get(&store, Platform::Bluesky, ts(1_000 + 3_600))
            .await
            .unwrap();
        assert!(expired.is_none());

        let other = RawCache::get(&store, Platform::X, ts(1_000)).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_slot_claimed_once() {
        let store = SqliteStore::in_memory().await.unwrap();

        assert!(store.claim_slot("ingest:x", 10, "a").await.unwrap());
        assert!(!store.claim_slot("ingest:x", 10, "b").await.unwrap());
        assert!(store.claim_slot("ingest:x", 11, "b").await.unwrap());
        assert!(store.claim_slot("ingest:bluesky", 10, "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_old_slots_are_pruned() {
        let store = SqliteStore::in_memory().await.unwrap();

        for slot in 0..96 {
            assert!(store.claim_slot("ingest:x", slot, "a").await.unwrap());
        }
        store.claim_slot("ingest:youtube", 3, "a").await.unwrap();

        let slots: Vec<(String, i64)> =
            sqlx::query_as("SELECT job, slot FROM job_slots ORDER BY job, slot")
                .fetch_all(&store.pool)
                .await
                .unwrap();
        assert_eq!(
            slots,
            vec![
                ("ingest:x".to_string(), 94),
                ("ingest:x".to_string(), 95),
                ("ingest:youtube".to_string(), 3),
            ]
        );

        // The previous slot is still guarded against a late claimer
        assert!(!store.claim_slot("ingest:x", 94, "b").await.unwrap());
    }

    #[tokio::test]
    async fn test_lease_acquire_release_expiry() {
        let store = SqliteStore::in_memory().await.unwrap();
        let now = ts(1_000);

        assert!(
            store
                .try_acquire("ingest:x", "a", now, ts(2_000))
                .await
                .unwrap()
        );
        assert!(
            !store
                .try_acquire("ingest:x", "b", now, ts(2_000))
                .await
                .unwrap()
        );

        // Expired leases can be taken over
        assert!(
            store
                .try_acquire("ingest:x", "b", ts(2_000), ts(3_000))
                .await
                .unwrap()
        );

        // Only the holder releases
        store.release("ingest:x", "a").await.unwrap();
        assert!(
            !store
                .try_acquire("ingest:x", "a", ts(2_100), ts(3_000))
                .await
                .unwrap()
        );
        store.release("ingest:x", "b").await.unwrap();
        assert!(
            store
                .try_acquire("ingest:x", "a", ts(2_100), ts(3_000))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("skillfeed.db");

        {
            let store = SqliteStore::new(&path).await.unwrap();
            store.upsert(&post(Platform::X, "1", "c", 1)).await.unwrap();
        }

        let store = SqliteStore::new(&path).await.unwrap();
        assert!(PostStore::get(&store, Platform::X, "1").await.unwrap().is_some());
    }
}
