//! Bluesky public post search adapter

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use skillfeed_domain::{
    ContentFilter, EngagementCounts, FetchError, NormalizeError, NormalizedPost, Platform,
    PlatformAdapter, RawItem,
};
use time::OffsetDateTime;

use crate::http::{
    HttpSettings, RetryPolicy, any_error, get_json, lenient_count, non_empty, parse_timestamp,
};

pub const DEFAULT_BASE_URL: &str = "https://public.api.bsky.app";

const SEARCH_QUERY: &str = "laravel ai OR laravel skills OR laravel agent OR php ai";
const LIMIT: &str = "50";

/// Adapter for `app.bsky.feed.searchPosts`. No credential needed; failures are
/// logged and yield an empty result.
pub struct BlueskyAdapter {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    filter: Arc<ContentFilter>,
}

impl BlueskyAdapter {
    pub fn new(filter: Arc<ContentFilter>) -> Self {
        Self::with_base_url(filter, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(filter: Arc<ContentFilter>, base_url: String) -> Self {
        let settings = HttpSettings::default();
        Self {
            client: settings.client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: settings.retry,
            filter,
        }
    }

    pub fn with_http(mut self, settings: HttpSettings) -> Self {
        self.client = settings.client();
        self.retry = settings.retry;
        self
    }

    async fn search(&self) -> Result<Vec<RawItem>, FetchError> {
        let url = format!("{}/xrpc/app.bsky.feed.searchPosts", self.base_url);
        let request = self.client.get(&url).query(&[
            ("q", SEARCH_QUERY),
            ("limit", LIMIT),
            ("sort", "latest"),
        ]);

        let response: SearchResponse = get_json(request).await?;

        response
            .posts
            .into_iter()
            .map(|post| {
                let content = post.record.text.clone().unwrap_or_default();
                Ok(RawItem {
                    native_id: post.uri.clone(),
                    content,
                    payload: serde_json::to_value(&post)
                        .map_err(|e| FetchError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    #[serde(default)]
    author: Author,
    #[serde(default)]
    record: Record,
    embed: Option<Embed>,
    #[serde(default, deserialize_with = "lenient_count")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    repost_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    reply_count: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    handle: Option<String>,
    display_name: Option<String>,
    avatar: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    text: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Embed {
    #[serde(default)]
    images: Vec<EmbedImage>,
    thumbnail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbedImage {
    fullsize: Option<String>,
}

/// Record key: the last segment of an AT URI
fn rkey(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[async_trait]
impl PlatformAdapter for BlueskyAdapter {
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        match self.retry.run(any_error, || self.search()).await {
            Ok(items) => {
                tracing::info!(platform = "bluesky", count = items.len(), "Fetched posts");
                Ok(items)
            }
            Err(e) => {
                tracing::warn!(platform = "bluesky", error = %e, "Bluesky API request failed");
                Ok(vec![])
            }
        }
    }

    fn normalize(
        &self,
        item: &RawItem,
        now: OffsetDateTime,
    ) -> Result<NormalizedPost, NormalizeError> {
        let post: PostView = serde_json::from_value(item.payload.clone())
            .map_err(|e| NormalizeError::Payload(e.to_string()))?;

        let engagement = EngagementCounts {
            likes: post.like_count,
            reposts: post.repost_count,
            replies: post.reply_count,
        };

        let media_url = post.embed.and_then(|embed| {
            embed
                .images
                .into_iter()
                .next()
                .and_then(|image| non_empty(image.fullsize))
                .or(non_empty(embed.thumbnail))
        });

        let handle = non_empty(post.author.handle).unwrap_or_else(|| "unknown".to_string());

        Ok(NormalizedPost {
            platform: Platform::Bluesky,
            post_url: format!("https://bsky.app/profile/{}/post/{}", handle, rkey(&post.uri)),
            platform_id: post.uri,
            author_name: non_empty(post.author.display_name).unwrap_or_else(|| handle.clone()),
            author_handle: handle,
            author_avatar_url: non_empty(post.author.avatar),
            content: post.record.text.unwrap_or_default(),
            media_url,
            engagement_score: engagement.score(),
            published_at: parse_timestamp(post.record.created_at.as_deref(), now),
            fetched_at: now,
        })
    }

    fn filter(&self, item: &RawItem) -> bool {
        self.filter.passes(&item.content)
    }

    fn platform(&self) -> Platform {
        Platform::Bluesky
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> BlueskyAdapter {
        BlueskyAdapter::with_base_url(Arc::new(ContentFilter::default()), server.uri()).with_http(
            HttpSettings {
                timeout: Duration::from_secs(5),
                retry: RetryPolicy {
                    attempts: 3,
                    backoff: Duration::from_millis(1),
                },
            },
        )
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    const URI: &str = "at://did:plc:abc123/app.bsky.feed.post/3kxyz";

    #[tokio::test]
    async fn test_fetch_and_normalize() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.searchPosts"))
            .and(query_param("limit", "50"))
            .and(query_param("sort", "latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posts": [{
                    "uri": URI,
                    "author": {
                        "handle": "dev.bsky.social",
                        "displayName": "Dev",
                        "avatar": "https://cdn.bsky.app/avatar.jpg"
                    },
                    "record": {
                        "text": "Shipping a Laravel agent today",
                        "createdAt": "2024-01-15T12:00:00.000Z"
                    },
                    "embed": {
                        "images": [{"fullsize": "https://cdn.bsky.app/full.jpg"}],
                        "thumbnail": "https://cdn.bsky.app/thumb.jpg"
                    },
                    "likeCount": 3,
                    "repostCount": 1,
                    "replyCount": 2
                }]
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let items = adapter.fetch().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].native_id, URI);
        assert!(adapter.filter(&items[0]));

        let post = adapter.normalize(&items[0], now()).unwrap();
        assert_eq!(post.platform_id, URI);
        assert_eq!(
            post.post_url,
            "https://bsky.app/profile/dev.bsky.social/post/3kxyz"
        );
        assert_eq!(post.author_name, "Dev");
        assert_eq!(post.engagement_score, 3 + 2 + 6);
        assert_eq!(
            post.media_url.as_deref(),
            Some("https://cdn.bsky.app/full.jpg")
        );
        assert_eq!(post.published_at.unix_timestamp(), 1_705_320_000);
    }

    #[tokio::test]
    async fn test_fallbacks() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/xrpc/app.bsky.feed.searchPosts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "posts": [{
                    "uri": URI,
                    "author": {"handle": "dev.bsky.social"},
                    "record": {"text": "php ai"},
                    "embed": {"thumbnail": "https://cdn.bsky.app/thumb.jpg"}
                }]
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let items = adapter.fetch().await.unwrap();
        let post = adapter.normalize(&items[0], now()).unwrap();

        assert_eq!(post.author_name, "dev.bsky.social");
        assert_eq!(
            post.media_url.as_deref(),
            Some("https://cdn.bsky.app/thumb.jpg")
        );
        assert_eq!(post.engagement_score, 0);
        assert_eq!(post.published_at, now());
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_after_retries() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let items = adapter(&server).fetch().await.unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_rkey() {
        assert_eq!(rkey(URI), "3kxyz");
        assert_eq!(rkey("plain"), "plain");
    }
}
