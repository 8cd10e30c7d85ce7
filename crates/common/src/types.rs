use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named Telegram bot token.
#[derive(Clone)]
pub struct BotToken {
    pub name: String,
    pub token: String,
}

impl BotToken {
    /// Token with the middle hidden, safe for logs (`1234…wxyz`).
    pub fn masked(&self) -> String {
        mask_token(&self.token)
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotToken")
            .field("name", &self.name)
            .field("token", &self.masked())
            .finish()
    }
}

/// Hide all but the first and last four characters of a secret.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// A Telegram message waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
}

impl OutboundMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            parse_mode: None,
        }
    }

    pub fn html(mut self) -> Self {
        self.parse_mode = Some("HTML".to_string());
        self
    }
}

/// Outcome of a queued delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status '{}'", other)),
        }
    }
}

/// A recorded Shopify order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub order_id: String,
    pub amount: f64,
    pub fraud_score: f64,
    pub created_at: DateTime<Utc>,
}

/// A row of the delivery log.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Delivery {
    pub id: String,
    pub requested_bot: String,
    pub delivered_by: Option<String>,
    pub chat_id: String,
    pub text: String,
    pub status: String,
    pub attempts: i64,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}
