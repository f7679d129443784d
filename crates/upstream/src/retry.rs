//! Bounded retry with exponential backoff for outbound HTTP calls.

use crate::error::{Upstream, UpstreamError, UpstreamResult};
use artstore_core::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Retry policy for transient failures.
///
/// Transport errors and 5xx responses are retried. Every other response,
/// including 4xx, is returned to the caller on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Send a request, retrying transient failures.
    pub async fn send<F, Fut>(
        &self,
        upstream: Upstream,
        mut make_request: F,
    ) -> UpstreamResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        let mut attempt = 0;

        loop {
            match make_request().await {
                Ok(response) if response.status().is_server_error() => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(UpstreamError::unavailable(
                            upstream,
                            format!("server error {}", response.status()),
                        ));
                    }
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        %upstream,
                        status = %response.status(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "server error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(UpstreamError::unavailable(upstream, e.to_string()));
                    }
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        %upstream,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "request error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Turn a non-success response into a permanent `Rejected` error.
pub(crate) async fn reject_unsuccessful(
    upstream: Upstream,
    response: reqwest::Response,
) -> UpstreamResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Rejected {
        upstream,
        status: status.as_u16(),
        message: body.chars().take(512).collect(),
    })
}

/// Decode a JSON body, failing closed on any shape mismatch.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    upstream: Upstream,
    response: reqwest::Response,
) -> UpstreamResult<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| UpstreamError::unavailable(upstream, e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| UpstreamError::invalid(upstream, e.to_string()))
}
