//! DEV.to articles adapter

use std::collections::HashSet;
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

use crate::http::{
    HttpSettings, RetryPolicy, any_error, get_json, lenient_count, non_empty, parse_timestamp,
};

pub const DEFAULT_BASE_URL: &str = "https://dev.to/api";

/// Tags queried in order; earlier tags win on duplicate articles
pub const TAGS: [&str; 2] = ["laravel", "php"];
const PER_PAGE: &str = "25";

/// Rising articles per tag, merged and deduplicated by article id. The API key is
/// optional.
pub struct DevToAdapter {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
    retry: RetryPolicy,
    filter: Arc<ContentFilter>,
}

impl DevToAdapter {
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

    async fn articles(&self, tag: &str) -> Result<Vec<Article>, FetchError> {
        let mut request = self
            .client
            .get(format!("{}/articles", self.base_url))
            .query(&[("tag", tag), ("per_page", PER_PAGE), ("state", "rising")]);

        if let Some(key) = &self.api_key {
            request = request.header("api-key", key.expose_secret());
        }

        get_json(request).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Article {
    id: u64,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tag_list: TagList,
    url: Option<String>,
    cover_image: Option<String>,
    social_image: Option<String>,
    public_reactions_count: Option<u64>,
    positive_reactions_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    comments_count: u64,
    published_at: Option<String>,
    #[serde(default)]
    user: User,
}

/// The list endpoint sends an array; single-article responses send a
/// comma-separated string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TagList {
    List(Vec<String>),
    Text(String),
}

impl Default for TagList {
    fn default() -> Self {
        TagList::List(vec![])
    }
}

impl TagList {
    fn joined(&self) -> String {
        match self {
            TagList::List(tags) => tags.join(" "),
            TagList::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct User {
    name: Option<String>,
    username: Option<String>,
    profile_image: Option<String>,
    profile_image_90: Option<String>,
}

impl Article {
    fn content(&self) -> String {
        format!(
            "{} {} {}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            self.tag_list.joined()
        )
    }
}

/// Concatenate per-tag results, keeping the first occurrence of each id
fn merge_unique(batches: Vec<Vec<Article>>) -> Vec<Article> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|article| seen.insert(article.id))
        .collect()
}

#[async_trait]
impl PlatformAdapter for DevToAdapter {
    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        let mut batches = Vec::with_capacity(TAGS.len());

        for tag in TAGS {
            match self.retry.run(any_error, || self.articles(tag)).await {
                Ok(articles) => {
                    tracing::debug!(platform = "devto", tag = tag, count = articles.len(), "Fetched tag");
                    batches.push(articles);
                }
                Err(e) => {
                    tracing::warn!(platform = "devto", tag = tag, error = %e, "DEV.to request failed, skipping tag");
                }
            }
        }

        let items = merge_unique(batches)
            .into_iter()
            .map(|article| {
                Ok(RawItem {
                    native_id: article.id.to_string(),
                    content: article.content(),
                    payload: serde_json::to_value(&article)
                        .map_err(|e| FetchError::Decode(e.to_string()))?,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        tracing::info!(platform = "devto", count = items.len(), "Fetched articles");
        Ok(items)
    }

    fn normalize(
        &self,
        item: &RawItem,
        now: OffsetDateTime,
    ) -> Result<NormalizedPost, NormalizeError> {
        let article: Article = serde_json::from_value(item.payload.clone())
            .map_err(|e| NormalizeError::Payload(e.to_string()))?;

        let engagement = EngagementCounts {
            likes: article
                .public_reactions_count
                .or(article.positive_reactions_count)
                .unwrap_or(0),
            reposts: 0,
            replies: article.comments_count,
        };

        let user = article.user;

        Ok(NormalizedPost {
            platform: Platform::DevTo,
            platform_id: article.id.to_string(),
            author_name: non_empty(user.name).unwrap_or_else(|| "Unknown".to_string()),
            author_handle: non_empty(user.username).unwrap_or_else(|| "unknown".to_string()),
            author_avatar_url: non_empty(user.profile_image_90).or(non_empty(user.profile_image)),
            content: article.title.unwrap_or_default(),
            media_url: non_empty(article.cover_image).or(non_empty(article.social_image)),
            post_url: article.url.unwrap_or_default(),
            engagement_score: engagement.score(),
            published_at: parse_timestamp(article.published_at.as_deref(), now),
            fetched_at: now,
        })
    }

    fn filter(&self, item: &RawItem) -> bool {
        self.filter.passes(&item.content)
    }

    fn platform(&self) -> Platform {
        Platform::DevTo
    }
}
