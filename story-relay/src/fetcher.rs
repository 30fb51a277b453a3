use crate::types::{FetchConfig, RelayError, Result};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Thin HTTP layer: timeouts, bounded retries with exponential backoff, and
/// per-host request spacing. Cloning shares the connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    last_request: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            config,
            last_request: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET `url` and decode the JSON body. `bearer` is sent as an
    /// `Authorization: Bearer` header when present.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, bearer: Option<&str>) -> Result<T> {
        let response = self
            .send_with_retry(url, || {
                let request = self.client.get(url);
                match bearer {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send the request produced by `build`, retrying transport failures,
    /// 5xx and 429 responses. Other non-2xx statuses fail immediately.
    pub async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            self.apply_rate_limit(url).await?;
            attempt += 1;

            let error = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let error = status_error(&response, url);
                    if !is_retryable_status(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) => RelayError::Http(e),
            };

            if attempt > self.config.max_retries {
                return Err(error);
            }
            match backoff.next_backoff() {
                Some(delay) => {
                    warn!("Attempt {} failed for {}: {}; retrying in {:?}", attempt, url, error, delay);
                    tokio::time::sleep(delay).await;
                }
                None => return Err(error),
            }
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.config.retry_delay_millis);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: initial * 16,
            multiplier: 2.0,
            max_elapsed_time: Some(self.config.timeout() * (self.config.max_retries + 1)),
            ..Default::default()
        }
    }

    async fn apply_rate_limit(&self, url: &str) -> Result<()> {
        let host = Url::parse(url)?.host_str().unwrap_or("").to_string();
        let min_interval = Duration::from_millis(self.config.min_host_interval_millis);

        let wait = {
            let mut last_request = self.last_request.lock().await;
            let now = Instant::now();
            let wait = last_request
                .get(&host)
                .map(|last| min_interval.saturating_sub(now.duration_since(*last)))
                .unwrap_or_default();
            last_request.insert(host.clone(), now + wait);
            wait
        };

        if !wait.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn status_error(response: &Response, url: &str) -> RelayError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RelayError::Auth(format!("HTTP {} from {}", status, url))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            RelayError::RateLimited { seconds }
        }
        _ => RelayError::Source(format!(
            "HTTP {}: {} ({})",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            url
        )),
    }
}
