use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use crate::services::providers::ProviderError;

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_BASE_BACKOFF_MS: u64 = 200;
const BACKOFF_JITTER_RATIO: f64 = 0.25;

/// Bounded-retry policy shared by the outbound HTTP providers. Bodies are
/// rebuilt by the `send` closure on every attempt, so multipart uploads
/// retry cleanly.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    pub async fn send<F, Fut>(
        &self,
        op: &'static str,
        send: F,
    ) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut last_error: Option<ProviderError> = None;

        for retry in 0..=self.max_retries {
            match send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    let body = resp.text().await.unwrap_or_default();
                    let err = ProviderError::HttpStatus { status, body };
                    if retry < self.max_retries && is_retryable(status) {
                        warn!(op, retry, %status, "provider request failed, retrying");
                        sleep(self.backoff(retry)).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let err = ProviderError::Request(e);
                    if retry < self.max_retries {
                        warn!(op, retry, "provider request error, retrying");
                        sleep(self.backoff(retry)).await;
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NotConfigured("unknown")))
    }

    fn backoff(&self, retry: usize) -> Duration {
        let base = self.base_backoff.as_millis() as u64 * (1u64 << retry.min(16));
        let jitter = (base as f64 * rand::rng().random_range(0.0..BACKOFF_JITTER_RATIO)) as u64;
        Duration::from_millis(base + jitter)
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_retryable(reqwest::StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_backoff_grows_with_retry_count() {
        let policy = RetryPolicy::default();
        let first = policy.backoff(0);
        let third = policy.backoff(2);
        assert!(third >= first * 2);
    }
}
