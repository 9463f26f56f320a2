//! Scripted adapter for tests and offline runs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use skillfeed_domain::{
    ContentFilter, FetchError, NormalizeError, NormalizedPost, Platform, PlatformAdapter, RawItem,
};
use time::OffsetDateTime;

/// Adapter returning scripted fetch results.
///
/// Payloads must deserialize as [`NormalizedPost`] minus `platform` and
/// `fetched_at`, which the adapter fills in.
pub struct StubAdapter {
    platform: Platform,
    responses: Mutex<VecDeque<Result<Vec<RawItem>, FetchError>>>,
    filter: Arc<ContentFilter>,
}

impl StubAdapter {
    /// Stub that returns nothing
    pub fn empty(platform: Platform) -> Self {
        Self {
            platform,
            responses: Mutex::new(VecDeque::new()),
            filter: Arc::new(ContentFilter::default()),
        }
    }

    /// Stub returning `items` on every fetch until another response is queued
    pub fn with_items(platform: Platform, items: Vec<RawItem>) -> Self {
        let stub = Self::empty(platform);
        stub.push(Ok(items));
        stub
    }

    /// Queue the result of a future fetch
    pub fn push(&self, response: Result<Vec<RawItem>, FetchError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }
}

#[derive(Deserialize)]
struct StubPayload {
    author_name: String,
    author_handle: String,
    author_avatar_url: Option<String>,
    media_url: Option<String>,
    post_url: String,
    #[serde(default)]
    engagement_score: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    published_at: Option<OffsetDateTime>,
}

#[async_trait]
impl PlatformAdapter for StubAdapter {
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A last queued success repeats; errors are consumed
        if responses.len() > 1 {
            return responses.pop_front().unwrap_or_else(|| Ok(vec![]));
        }
        match responses.front() {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(_)) => responses.pop_front().unwrap_or_else(|| Ok(vec![])),
            None => Ok(vec![]),
        }
    }

    fn normalize(
        &self,
        item: &RawItem,
        now: OffsetDateTime,
    ) -> Result<NormalizedPost, NormalizeError> {
        let payload: StubPayload = serde_json::from_value(item.payload.clone())
            .map_err(|e| NormalizeError::Payload(e.to_string()))?;

        Ok(NormalizedPost {
            platform: self.platform,
            platform_id: item.native_id.clone(),
            author_name: payload.author_name,
            author_handle: payload.author_handle,
            author_avatar_url: payload.author_avatar_url,
            content: item.content.clone(),
            media_url: payload.media_url,
            post_url: payload.post_url,
            engagement_score: payload.engagement_score,
            published_at: payload.published_at.unwrap_or(now),
            fetched_at: now,
        })
    }

    fn filter(&self, item: &RawItem) -> bool {
        self.filter.passes(&item.content)
    }

    fn platform(&self) -> Platform {
        self.platform
    }
}

/// Build a raw item the stub adapter can normalize
pub fn stub_item(native_id: &str, content: &str, engagement_score: u64) -> RawItem {
    RawItem {
        native_id: native_id.to_string(),
        content: content.to_string(),
        payload: serde_json::json!({
            "author_name": "Stub Author",
            "author_handle": "stub",
            "author_avatar_url": null,
            "media_url": null,
            "post_url": format!("https://example.invalid/{}", native_id),
            "engagement_score": engagement_score,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_response_repeats() {
        let stub = StubAdapter::with_items(Platform::Bluesky, vec![stub_item("1", "a", 0)]);
        assert_eq!(stub.fetch().await.unwrap().len(), 1);
        assert_eq!(stub.fetch().await.unwrap().len(), 1);

        stub.push(Err(FetchError::Network("down".to_string())));
        // The first response is consumed once a second one is queued
        assert_eq!(stub.fetch().await.unwrap().len(), 1);
        assert!(stub.fetch().await.is_err());
        assert!(stub.fetch().await.unwrap().is_empty());
    }

    #[test]
    fn test_normalize_stub_item() {
        let stub = StubAdapter::empty(Platform::X);
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let post = stub
            .normalize(&stub_item("9", "laravel ai", 12), now)
            .unwrap();

        assert_eq!(post.platform, Platform::X);
        assert_eq!(post.platform_id, "9");
        assert_eq!(post.engagement_score, 12);
        assert_eq!(post.published_at, now);
    }
}
