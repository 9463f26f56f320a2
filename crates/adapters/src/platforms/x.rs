//! X (Twitter) recent search adapter

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use skillfeed_domain::{
    ContentFilter, EngagementCounts, FailurePolicy, FetchError, NormalizeError, NormalizedPost,
    Platform, PlatformAdapter, RawItem,
};
use time::OffsetDateTime;

use crate::http::{
    HttpSettings, RetryPolicy, get_json, lenient_count, non_empty, parse_timestamp,
};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

const SEARCH_QUERY: &str =
    r#"(laravel OR php) (ai OR skills OR agent OR "claude code") -is:retweet lang:en"#;
const MAX_RESULTS: &str = "50";

/// Adapter for the X v2 recent search endpoint.
///
/// Requires a bearer token. Only rate-limit responses are retried, and a failure
/// that survives the retries is returned to the caller.
pub struct XAdapter {
    client: Client,
    bearer_token: Option<SecretString>,
    base_url: String,
    retry: RetryPolicy,
    filter: Arc<ContentFilter>,
}

impl XAdapter {
    pub fn new(bearer_token: Option<SecretString>, filter: Arc<ContentFilter>) -> Self {
        Self::with_base_url(bearer_token, filter, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        bearer_token: Option<SecretString>,
        filter: Arc<ContentFilter>,
        base_url: String,
    ) -> Self {
        let settings = HttpSettings::default();
        Self {
            client: settings.client(),
            bearer_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: settings.retry,
            filter,
        }
    }

    /// Override timeout and retry settings
    pub fn with_http(mut self, settings: HttpSettings) -> Self {
        self.client = settings.client();
        self.retry = settings.retry;
        self
    }

    async fn search(&self, token: &SecretString) -> Result<Vec<RawItem>, FetchError> {
        let url = format!("{}/2/tweets/search/recent", self.base_url);

        let request = self.client.get(&url).bearer_auth(token.expose_secret()).query(&[
            ("query", SEARCH_QUERY),
            ("max_results", MAX_RESULTS),
            ("tweet.fields", "created_at,public_metrics,author_id"),
            ("user.fields", "name,username,profile_image_url"),
            ("expansions", "author_id,attachments.media_keys"),
            ("media.fields", "url,preview_image_url"),
        ]);

        let response: SearchResponse = get_json(request).await?;
        response.into_items()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Deserialize, Default)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    created_at: Option<String>,
    author_id: Option<String>,
    #[serde(default)]
    public_metrics: Metrics,
    attachments: Option<Attachments>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Metrics {
    #[serde(default, deserialize_with = "lenient_count")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    retweet_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    reply_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: String,
    name: Option<String>,
    username: Option<String>,
    profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Media {
    media_key: String,
    url: Option<String>,
    preview_image_url: Option<String>,
}

/// Tweet with its expansions resolved
#[derive(Debug, Serialize, Deserialize)]
struct XPayload {
    tweet: Tweet,
    author: Option<User>,
    media: Option<Media>,
}

impl SearchResponse {
    fn into_items(self) -> Result<Vec<RawItem>, FetchError> {
        let users: HashMap<String, User> = self
            .includes
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let media: HashMap<String, Media> = self
            .includes
            .media
            .into_iter()
            .map(|m| (m.media_key.clone(), m))
            .collect();

        self.data
            .into_iter()
            .map(|tweet| {
                let author = tweet
                    .author_id
                    .as_ref()
                    .and_then(|id| users.get(id))
                    .cloned();
                let media = tweet
                    .attachments
                    .as_ref()
                    .and_then(|a| a.media_keys.first())
                    .and_then(|key| media.get(key))
                    .cloned();

                let native_id = tweet.id.clone();
                let content = tweet.text.clone();
                let payload = serde_json::to_value(XPayload {
                    tweet,
                    author,
                    media,
                })
                .map_err(|e| FetchError::Decode(e.to_string()))?;

                Ok(RawItem {
                    native_id,
                    content,
                    payload,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PlatformAdapter for XAdapter {
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        let Some(token) = &self.bearer_token else {
            tracing::warn!(platform = "x", "X bearer token not configured");
            return Ok(vec![]);
        };

        let items = self
            .retry
            .run(FetchError::is_rate_limited, || self.search(token))
            .await
            .inspect_err(|e| tracing::error!(platform = "x", error = %e, "X API request failed"))?;

        tracing::info!(platform = "x", count = items.len(), "Fetched posts");
        Ok(items)
    }

    fn normalize(
        &self,
        item: &RawItem,
        now: OffsetDateTime,
    ) -> Result<NormalizedPost, NormalizeError> {
        let XPayload {
            tweet,
            author,
            media,
        } = serde_json::from_value(item.payload.clone())
            .map_err(|e| NormalizeError::Payload(e.to_string()))?;

        let engagement = EngagementCounts {
            likes: tweet.public_metrics.like_count,
            reposts: tweet.public_metrics.retweet_count,
            replies: tweet.public_metrics.reply_count,
        };

        let (name, handle, avatar) = match author {
            Some(user) => (
                non_empty(user.name),
                non_empty(user.username),
                non_empty(user.profile_image_url),
            ),
            None => (None, None, None),
        };
        let handle = handle.unwrap_or_else(|| "unknown".to_string());

        Ok(NormalizedPost {
            platform: Platform::X,
            post_url: format!("https://x.com/{}/status/{}", handle, tweet.id),
            platform_id: tweet.id,
            author_name: name.unwrap_or_else(|| "Unknown".to_string()),
            author_handle: handle,
            author_avatar_url: avatar,
            content: tweet.text,
            media_url: media.and_then(|m| non_empty(m.url).or(non_empty(m.preview_image_url))),
            engagement_score: engagement.score(),
            published_at: parse_timestamp(tweet.created_at.as_deref(), now),
            fetched_at: now,
        })
    }

    fn filter(&self, item: &RawItem) -> bool {
        self.filter.passes(&item.content)
    }

    fn platform(&self) -> Platform {
        Platform::X
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Propagate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, token: Option<&str>) -> XAdapter {
        XAdapter::with_base_url(
            token.map(|t| SecretString::new(t.into())),
            Arc::new(ContentFilter::default()),
            server.uri(),
        )
        .with_http(HttpSettings {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                attempts: 3,
                backoff: Duration::from_millis(1),
            },
        })
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_and_normalize_branded_post() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .and(header("Authorization", "Bearer test-token"))
            .and(query_param("max_results", "50"))
            .and(query_param("expansions", "author_id,attachments.media_keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "1750000000000000001",
                    "text": "Laravel + Claude Code skill released #laravelskills",
                    "created_at": "2024-01-15T12:00:00Z",
                    "author_id": "u1",
                    "public_metrics": {"like_count": 5, "retweet_count": 2, "reply_count": 1},
                    "attachments": {"media_keys": ["m1"]}
                }],
                "includes": {
                    "users": [{
                        "id": "u1",
                        "name": "Taylor",
                        "username": "taylor",
                        "profile_image_url": "https://pbs.twimg.com/a.jpg"
                    }],
                    "media": [{"media_key": "m1", "preview_image_url": "https://pbs.twimg.com/m.jpg"}]
                }
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("test-token"));
        let items = adapter.fetch().await.unwrap();

        assert_eq!(items.len(), 1);
        assert!(adapter.filter(&items[0]));

        let post = adapter.normalize(&items[0], now()).unwrap();
        assert_eq!(post.platform, Platform::X);
        assert_eq!(post.platform_id, "1750000000000000001");
        assert_eq!(post.author_name, "Taylor");
        assert_eq!(post.author_handle, "taylor");
        assert_eq!(post.engagement_score, 5 + 2 * 2 + 3);
        assert_eq!(
            post.post_url,
            "https://x.com/taylor/status/1750000000000000001"
        );
        assert_eq!(
            post.media_url.as_deref(),
            Some("https://pbs.twimg.com/m.jpg")
        );
        assert_eq!(post.published_at.unix_timestamp(), 1_705_320_000);
        assert_eq!(post.fetched_at, now());
    }

    #[tokio::test]
    async fn test_zero_engagement_and_missing_author() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "9", "text": "#laravelskills"}]
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("t"));
        let items = adapter.fetch().await.unwrap();
        let post = adapter.normalize(&items[0], now()).unwrap();

        assert_eq!(post.engagement_score, 0);
        assert_eq!(post.author_name, "Unknown");
        assert_eq!(post.author_handle, "unknown");
        assert_eq!(post.post_url, "https://x.com/unknown/status/9");
        assert_eq!(post.published_at, now());
        assert!(post.media_url.is_none());
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let items = adapter(&server, None).fetch().await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_then_propagated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let result = adapter(&server, Some("t")).fetch().await;
        assert!(matches!(result, Err(FetchError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
            .expect(1)
            .mount(&server)
            .await;

        let result = adapter(&server, Some("t")).fetch().await;
        assert!(matches!(result, Err(FetchError::Api(_))));
    }

    #[tokio::test]
    async fn test_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/tweets/search/recent"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = adapter(&server, Some("bad-token")).fetch().await;
        assert!(matches!(result, Err(FetchError::Auth(_))));
    }
}
