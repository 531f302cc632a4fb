//! REST client for the eGain indoor endpoint.
//!
//! Wraps `GET {base_url}/{sensor_id}` using [`reqwest`]. Every call takes
//! a token from the shared [`RateLimiter`] before touching the network
//! and is bounded by a fixed timeout measured from the start of the call,
//! so a long rate-limit wait eats into the request budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use egain_core::reading::Reading;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::ratelimit::RateLimiter;
use crate::ReadingSource;

/// Public eGain deployment endpoint for indoor sensors.
pub const DEFAULT_BASE_URL: &str = "https://deployment.egain.io/api/indoor";

/// Upper bound on a single fetch, rate-limit wait included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the eGain API, shared by all sensors.
pub struct EgainClient {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl EgainClient {
    /// Create a client against `base_url`, e.g.
    /// `https://deployment.egain.io/api/indoor`.
    pub fn new(base_url: impl Into<String>, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, limiter, timeout)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            limiter,
            timeout,
        }
    }

    /// URL of the reading resource for one sensor.
    ///
    /// The id is appended as a single percent-encoded path segment, so
    /// reserved characters such as `/`, `?` or `#` stay part of the id.
    pub fn reading_url(&self, sensor_id: &str) -> Result<reqwest::Url, FetchError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| FetchError::Url(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| FetchError::Url(format!("{}: cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(sensor_id);
        Ok(url)
    }

    /// Fetch and decode the current reading for `sensor_id`.
    ///
    /// Fails with [`FetchError::Cancelled`] as soon as `cancel` fires,
    /// whether the call is waiting for a rate-limit token or for the
    /// response, and with [`FetchError::Timeout`] once the bound elapses.
    pub async fn fetch_reading(
        &self,
        sensor_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Reading, FetchError> {
        let deadline = Instant::now() + self.timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout_at(deadline, self.request(sensor_id)) => {
                result.unwrap_or_else(|_| Err(FetchError::Timeout(self.timeout)))
            }
        }
    }

    async fn request(&self, sensor_id: &str) -> Result<Reading, FetchError> {
        self.limiter.acquire().await;

        let url = self.reading_url(sensor_id)?;
        tracing::debug!(sensor_id, url = %url, "Fetching sensor data");

        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await?;

        Ok(Reading::from_json(&body)?)
    }

    // ---- private helpers ----

    /// Return the response unchanged on a 2xx status, or a
    /// [`FetchError::Status`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ReadingSource for EgainClient {
    async fn fetch(
        &self,
        sensor_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Reading, FetchError> {
        self.fetch_reading(sensor_id, cancel).await
    }
}
