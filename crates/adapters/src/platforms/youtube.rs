//! YouTube Data API v3 adapter

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use skillfeed_domain::{
    ContentFilter, EngagementCounts, FetchError, NormalizeError, NormalizedPost, Platform,
    PlatformAdapter, RawItem,
};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::http::{
    HttpSettings, RetryPolicy, any_error, get_json, lenient_count, non_empty, parse_timestamp,
};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

const SEARCH_QUERY: &str = "laravel ai skills OR laravel claude OR php ai agent";
const MAX_RESULTS: &str = "25";
const LOOKBACK_DAYS: i64 = 7;

/// Video search plus one batched statistics lookup. Needs an API key.
pub struct YouTubeAdapter {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    retry: RetryPolicy,
    filter: Arc<ContentFilter>,
}

impl YouTubeAdapter {
    pub fn new(api_key: Option<SecretString>, filter: Arc<ContentFilter>) -> Self {
        Self::with_base_url(api_key, filter, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        api_key: Option<SecretString>,
        filter: Arc<ContentFilter>,
        base_url: String,
    ) -> Self {
        let settings = HttpSettings::default();
        Self {
            client: settings.client(),
            api_key,
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

    async fn search(&self, key: &SecretString) -> Result<Vec<SearchItem>, FetchError> {
        let published_after = (OffsetDateTime::now_utc() - time::Duration::days(LOOKBACK_DAYS))
            .format(&Rfc3339)
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        let request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("key", key.expose_secret()),
                ("q", SEARCH_QUERY),
                ("part", "snippet"),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", MAX_RESULTS),
                ("publishedAfter", published_after.as_str()),
            ]);

        let response: SearchResponse = get_json(request).await?;
        Ok(response.items)
    }

    async fn statistics(
        &self,
        key: &SecretString,
        ids: &str,
    ) -> Result<HashMap<String, Statistics>, FetchError> {
        let request = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("key", key.expose_secret()),
                ("id", ids),
                ("part", "statistics"),
            ]);

        let response: VideosResponse = get_json(request).await?;
        Ok(response
            .items
            .into_iter()
            .map(|v| (v.id, v.statistics))
            .collect())
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchItem {
    id: VideoId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoId {
    video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    channel_id: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoStats>,
}

#[derive(Deserialize)]
struct VideoStats {
    id: String,
    #[serde(default)]
    statistics: Statistics,
}

/// Counters are sent as decimal strings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default, deserialize_with = "lenient_count")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    comment_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct YouTubePayload {
    video_id: String,
    snippet: Snippet,
    statistics: Statistics,
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        let Some(key) = &self.api_key else {
            tracing::warn!(platform = "youtube", "YouTube API key not configured");
            return Ok(vec![]);
        };

        let results = match self.retry.run(any_error, || self.search(key)).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(platform = "youtube", error = %e, "YouTube search request failed");
                return Ok(vec![]);
            }
        };

        let videos: Vec<(String, Snippet)> = results
            .into_iter()
            .filter_map(|item| Some((non_empty(item.id.video_id)?, item.snippet)))
            .collect();

        if videos.is_empty() {
            return Ok(vec![]);
        }

        let ids = videos
            .iter()
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let stats = match self.retry.run(any_error, || self.statistics(key, &ids)).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(
                    platform = "youtube",
                    error = %e,
                    "YouTube statistics request failed, proceeding without engagement"
                );
                HashMap::new()
            }
        };

        let items = videos
            .into_iter()
            .map(|(video_id, snippet)| {
                let content = format!(
                    "{} {}",
                    snippet.title.as_deref().unwrap_or_default(),
                    snippet.description.as_deref().unwrap_or_default()
                );
                let statistics = stats.get(&video_id).copied().unwrap_or_default();
                let payload = serde_json::to_value(YouTubePayload {
                    video_id: video_id.clone(),
                    snippet,
                    statistics,
                })
                .map_err(|e| FetchError::Decode(e.to_string()))?;

                Ok(RawItem {
                    native_id: video_id,
                    content,
                    payload,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        tracing::info!(platform = "youtube", count = items.len(), "Fetched videos");
        Ok(items)
    }

    fn normalize(
        &self,
        item: &RawItem,
        now: OffsetDateTime,
    ) -> Result<NormalizedPost, NormalizeError> {
        let YouTubePayload {
            video_id,
            snippet,
            statistics,
        } = serde_json::from_value(item.payload.clone())
            .map_err(|e| NormalizeError::Payload(e.to_string()))?;

        let engagement = EngagementCounts {
            likes: statistics.like_count,
            reposts: 0,
            replies: statistics.comment_count,
        };

        let thumbnails = snippet.thumbnails;
        let media_url = [thumbnails.high, thumbnails.medium, thumbnails.default]
            .into_iter()
            .flatten()
            .find_map(|t| non_empty(t.url));

        Ok(NormalizedPost {
            platform: Platform::YouTube,
            post_url: format!("https://www.youtube.com/watch?v={}", video_id),
            platform_id: video_id,
            author_name: non_empty(snippet.channel_title).unwrap_or_else(|| "Unknown".to_string()),
            author_handle: snippet.channel_id.unwrap_or_default(),
            author_avatar_url: None,
            content: snippet.title.unwrap_or_default(),
            media_url,
            engagement_score: engagement.score(),
            published_at: parse_timestamp(snippet.published_at.as_deref(), now),
            fetched_at: now,
        })
    }

    fn filter(&self, item: &RawItem) -> bool {
        self.filter.passes(&item.content)
    }

    fn platform(&self) -> Platform {
        Platform::YouTube
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, key: Option<&str>) -> YouTubeAdapter {
        YouTubeAdapter::with_base_url(
            key.map(|k| SecretString::new(k.into())),
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

    fn search_body() -> serde_json::Value {
        serde_json::json!({
            "items": [{
                "id": {"kind": "youtube#video", "videoId": "vid1"},
                "snippet": {
                    "title": "Laravel Boost walkthrough",
                    "description": "Using Claude Code with Laravel",
                    "channelTitle": "Laracasts",
                    "channelId": "UC123",
                    "publishedAt": "2024-01-15T12:00:00Z",
                    "thumbnails": {
                        "medium": {"url": "https://i.ytimg.com/vi/vid1/mqdefault.jpg"},
                        "default": {"url": "https://i.ytimg.com/vi/vid1/default.jpg"}
                    }
                }
            }]
        })
    }

    async fn mount_search(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("key", "yt-key"))
            .and(query_param("type", "video"))
            .and(query_param("maxResults", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_with_statistics() {
        let server = MockServer::start().await;
        mount_search(&server).await;

        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "vid1"))
            .and(query_param("part", "statistics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "vid1",
                    "statistics": {"viewCount": "900", "likeCount": "40", "commentCount": "5"}
                }]
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("yt-key"));
        let items = adapter.fetch().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].content,
            "Laravel Boost walkthrough Using Claude Code with Laravel"
        );
        // Only the description carries an AI keyword
        assert!(adapter.filter(&items[0]));

        let post = adapter.normalize(&items[0], now()).unwrap();
        assert_eq!(post.platform_id, "vid1");
        assert_eq!(post.content, "Laravel Boost walkthrough");
        assert_eq!(post.engagement_score, 40 + 5 * 3);
        assert_eq!(post.author_name, "Laracasts");
        assert_eq!(post.author_handle, "UC123");
        assert!(post.author_avatar_url.is_none());
        assert_eq!(post.post_url, "https://www.youtube.com/watch?v=vid1");
        assert_eq!(
            post.media_url.as_deref(),
            Some("https://i.ytimg.com/vi/vid1/mqdefault.jpg")
        );
    }

    #[tokio::test]
    async fn test_statistics_failure_degrades_to_zero() {
        let server = MockServer::start().await;
        mount_search(&server).await;

        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("yt-key"));
        let items = adapter.fetch().await.unwrap();
        assert_eq!(items.len(), 1);

        let post = adapter.normalize(&items[0], now()).unwrap();
        assert_eq!(post.engagement_score, 0);
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(adapter(&server, None).fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_is_swallowed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(403))
            .expect(3)
            .mount(&server)
            .await;

        assert!(
            adapter(&server, Some("yt-key"))
                .fetch()
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_count_accepts_strings_and_numbers() {
        let stats: Statistics =
            serde_json::from_value(serde_json::json!({"likeCount": "12", "commentCount": 3}))
                .unwrap();
        assert_eq!(stats.like_count, 12);
        assert_eq!(stats.comment_count, 3);
    }
}
