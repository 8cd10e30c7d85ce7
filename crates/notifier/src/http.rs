//! JSON-over-HTTP client with bounded retries and exponential backoff.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

const USER_AGENT: &str = "EmpireBot/2.0";

/// How many times to try a request and how long to wait between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempt` (0-based): base * 2^attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Every attempt failed with a transport error or a 5xx response.
#[derive(Debug, Clone, Error, Serialize)]
#[error("request failed after {attempts} attempts: {message}")]
pub struct RequestFailure {
    pub message: String,
    pub attempts: u32,
}

impl RequestFailure {
    pub fn to_json(&self) -> Value {
        json!({
            "error": "request_failed",
            "message": self.message,
            "attempts": self.attempts,
        })
    }
}

/// A `reqwest` client that retries transport errors and server errors.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.timeout)
            .build()?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST `payload` as JSON, retrying until a response below 500 arrives.
    ///
    /// Client errors (4xx) are not retried; their body is returned so the
    /// caller can inspect the API's own error description.
    pub async fn post_json<T>(&self, url: &str, payload: &T) -> Result<Value, RequestFailure>
    where
        T: Serialize + ?Sized,
    {
        self.send_with_retry(|| self.client.post(url).json(payload))
            .await
    }

    /// GET a JSON document with a single attempt.
    pub async fn get_json(&self, url: &str) -> Result<Value, RequestFailure> {
        match self.client.get(url).send().await {
            Ok(resp) => Ok(read_body(resp).await),
            Err(e) => Err(RequestFailure {
                message: e.without_url().to_string(),
                attempts: 1,
            }),
        }
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<Value, RequestFailure>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.policy.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match build().send().await {
                Ok(resp) if resp.status().as_u16() < 500 => return Ok(read_body(resp).await),
                Ok(resp) => last_error = format!("server returned {}", resp.status()),
                // The URL carries the bot token, keep it out of the message.
                Err(e) => last_error = e.without_url().to_string(),
            }

            if attempt + 1 < attempts {
                let delay = self.policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Request failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(RequestFailure {
            message: last_error,
            attempts,
        })
    }
}

/// Parse a response body as JSON, wrapping anything else in a Bot API style error.
async fn read_body(resp: Response) -> Value {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or_else(|_| {
        json!({
            "ok": false,
            "error_code": status.as_u16(),
            "description": text,
        })
    })
}
