//! Shared HTTP policy for upstream model APIs.
//!
//! Every provider posts JSON through [`JsonClient::post_json`], which applies
//! the configured per-call timeout and retries transient failures
//! (transport errors, 408, 429 and 5xx) with exponential backoff. Other
//! non-2xx responses fail on the first attempt.
//!
//! ```text
//! attempt 1 ──fail──▶ sleep initial ──▶ attempt 2 ──fail──▶ sleep 2×initial ──▶ …
//! ```
//!
//! Delays double from `initial_backoff_ms` and are capped at
//! [`MAX_BACKOFF`]. When the last attempt fails the error is surfaced as
//! [`Error::Upstream`] carrying the last HTTP status, if any.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use knowledge_assistant_core::{Error, Result};

use crate::config::HttpPolicy;

pub const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// Upstream error bodies are truncated to this many characters in messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Delay before retry number `retry` (1-based).
pub fn backoff_delay(policy: &HttpPolicy, retry: u32) -> Duration {
    let factor = 1u64 << retry.saturating_sub(1).min(16);
    let delay = Duration::from_millis(policy.initial_backoff_ms.saturating_mul(factor));
    delay.min(MAX_BACKOFF)
}

/// Whether a response status is worth retrying.
pub fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// A `reqwest` client bound to one provider name and retry policy.
#[derive(Clone)]
pub struct JsonClient {
    client: reqwest::Client,
    provider: &'static str,
    policy: HttpPolicy,
}

impl JsonClient {
    pub fn new(provider: &'static str, policy: HttpPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            provider,
            policy,
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// POST `body` to `url` and decode the JSON response.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<Value> {
        let mut last_status: Option<u16> = None;
        let mut last_message = String::from("no attempt made");

        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(&self.policy, attempt);
                warn!(
                    event = "upstream_retry",
                    provider = self.provider,
                    attempt,
                    status = last_status,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_message,
                    "retrying upstream call"
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            for (name, value) in headers {
                request = request.header(*name, value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            Error::upstream(
                                self.provider,
                                Some(status.as_u16()),
                                format!("invalid JSON response: {e}"),
                            )
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    last_status = Some(status.as_u16());
                    last_message = format!("HTTP {status}: {}", truncate(&body_text));
                    if !is_retryable(status) {
                        break;
                    }
                }
                Err(e) => {
                    last_status = e.status().map(|s| s.as_u16());
                    last_message = format!("request failed: {e}");
                }
            }
        }

        Err(Error::upstream(self.provider, last_status, last_message))
    }
}

fn truncate(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Error for a 2xx response that lacks an expected field.
pub fn malformed(provider: &str, what: &str) -> Error {
    Error::upstream(provider, None, format!("malformed response: {what}"))
}
