//! Shared HTTP plumbing for platform adapters

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use skillfeed_domain::FetchError;
use time::OffsetDateTime;

/// Bounded retry with fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, `should_retry` rejects the error, or attempts
    /// run out. The last error is returned.
    pub async fn run<T, F, Fut, P>(&self, should_retry: P, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        P: Fn(&FetchError) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && should_retry(&e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Retry predicate accepting every error
pub fn any_error(_: &FetchError) -> bool {
    true
}

/// HTTP settings shared by all adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl HttpSettings {
    pub fn client(&self) -> Client {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("skillfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client")
    }
}

/// Send a request and decode a JSON body, mapping failures onto `FetchError`
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let response = check_status(response).await?;

    response
        .json()
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Auth(format!("Credential rejected ({})", status)));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|ts| {
                let now = OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
                Duration::from_secs(ts.saturating_sub(now))
            });
        return Err(FetchError::RateLimited(retry_after));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::Api(format!("{}: {}", status, body)));
    }

    Ok(response)
}

/// Parse an RFC 3339 timestamp, falling back to `now`
pub fn parse_timestamp(value: Option<&str>, now: OffsetDateTime) -> OffsetDateTime {
    value
        .and_then(|s| OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok())
        .unwrap_or(now)
}

/// Counter sent as a number, a decimal string or `null`. Anything unreadable
/// counts as zero.
pub fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        Some(Count::Number(n)) => n,
        Some(Count::Text(s)) => s.trim().parse().unwrap_or(0),
        None => 0,
    })
}

/// Treat empty strings like missing values
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_stops_after_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run(any_error, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Network("down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(FetchError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let calls = &AtomicU32::new(0);
        let result = fast()
            .run(any_error, || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::Api("500".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_predicate_rejects() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run(FetchError::is_rate_limited, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Auth("bad".to_string()))
            })
            .await;

        assert!(matches!(result, Err(FetchError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_timestamp_fallback() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(parse_timestamp(None, now), now);
        assert_eq!(parse_timestamp(Some("yesterday"), now), now);
        assert_eq!(
            parse_timestamp(Some("2024-01-15T12:00:00Z"), now).unix_timestamp(),
            1_705_320_000
        );
    }

    #[test]
    fn test_lenient_count() {
        #[derive(Deserialize)]
        struct Counts {
            #[serde(default, deserialize_with = "lenient_count")]
            a: u64,
            #[serde(default, deserialize_with = "lenient_count")]
            b: u64,
            #[serde(default, deserialize_with = "lenient_count")]
            c: u64,
            #[serde(default, deserialize_with = "lenient_count")]
            d: u64,
        }

        let counts: Counts =
            serde_json::from_value(serde_json::json!({"a": 7, "b": "12", "c": null})).unwrap();
        assert_eq!((counts.a, counts.b, counts.c, counts.d), (7, 12, 0, 0));
    }
}
