//! Minimal Telegram Bot API client: `sendMessage` and `getMe`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use empire_common::types::{OutboundMessage, mask_token};

use crate::http::{RequestFailure, RetryPolicy, RetryingClient};

/// The envelope every Bot API method returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl TelegramResponse {
    fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| TelegramResponse {
            ok: false,
            description: Some(value.to_string()),
            ..Default::default()
        })
    }

    /// Human readable reason for an unsuccessful response.
    pub fn failure_reason(&self) -> String {
        match (&self.error_code, &self.description) {
            (Some(code), Some(desc)) => format!("{}: {}", code, desc),
            (None, Some(desc)) => desc.clone(),
            (Some(code), None) => format!("error code {}", code),
            (None, None) => "telegram returned ok=false".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: RetryingClient,
    api_base: String,
}

impl TelegramClient {
    pub fn new(api_base: impl Into<String>, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: RetryingClient::new(policy)?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method)
    }

    /// Send a text message. Retries follow the client's [`RetryPolicy`].
    pub async fn send_message(
        &self,
        token: &str,
        message: &OutboundMessage,
    ) -> Result<TelegramResponse, RequestFailure> {
        tracing::debug!(
            token = %mask_token(token),
            chat_id = %message.chat_id,
            "Sending Telegram message"
        );
        let body = self
            .http
            .post_json(&self.method_url(token, "sendMessage"), message)
            .await?;
        Ok(TelegramResponse::from_value(body))
    }

    /// Whether the token belongs to a live bot. Any failure counts as offline.
    pub async fn get_me(&self, token: &str) -> bool {
        match self.http.get_json(&self.method_url(token, "getMe")).await {
            Ok(body) => TelegramResponse::from_value(body).ok,
            Err(e) => {
                tracing::debug!(token = %mask_token(token), error = %e, "getMe failed");
                false
            }
        }
    }
}
