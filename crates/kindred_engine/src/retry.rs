//! Exponential backoff for outbound HTTP calls (LLM provider, carrier).
//!
//! Retries transient failures only: 429, 5xx, and network/timeout errors.
//! Client errors (400/401/403/404) fail immediately.

use anyhow::Result;
use reqwest::{Response, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Run `operation` until it yields a success response, a non-retryable
/// status, or attempts run out.
pub async fn with_backoff<F, Fut>(policy: &RetryPolicy, label: &str, operation: F) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response>>,
{
    let mut delay = policy.initial_delay;
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !is_retryable(status) {
                    anyhow::bail!("{} rejected the request ({}): {}", label, status, body);
                }
                tracing::warn!(
                    "{} answered {} on attempt {}/{}",
                    label,
                    status,
                    attempt,
                    policy.max_attempts
                );
                last_error = format!("{}: {}", status, body);
            }
            Err(e) => {
                tracing::warn!(
                    "{} call failed on attempt {}/{}: {}",
                    label,
                    attempt,
                    policy.max_attempts,
                    e
                );
                last_error = e.to_string();
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(policy.max_delay);
        }
    }

    anyhow::bail!("{} failed after {} attempts: {}", label, policy.max_attempts, last_error)
}
