//! Multi-bot failover dispatcher.
//!
//! A message is offered to each bot in the failover order until one of them
//! gets `ok: true` back from Telegram. Every request to a single bot is already
//! retried with backoff by the HTTP layer, so a failure here means that bot is
//! out of options and the next one takes over.
//!
//! Bots accumulate a consecutive-failure count. Once a bot reaches the
//! configured threshold it is demoted behind every healthy bot; it is still
//! tried last, so a message is never dropped just because every bot is
//! demoted. A single success resets the count.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use empire_common::config::AppConfig;
use empire_common::types::{BotToken, OutboundMessage};

use crate::http::RetryPolicy;
use crate::telegram::TelegramClient;

/// One bot's turn at delivering a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotAttempt {
    pub bot: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of walking the failover order for one message.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub delivered: bool,
    pub delivered_by: Option<String>,
    pub attempts: Vec<BotAttempt>,
    /// Last Bot API response, or the request-failure document.
    pub response: Value,
}

impl DispatchReport {
    fn no_bots() -> Self {
        Self {
            delivered: false,
            delivered_by: None,
            attempts: Vec::new(),
            response: json!({"ok": false, "error": "no bots configured"}),
        }
    }

    /// Errors from every failed attempt, joined for logging and the delivery log.
    pub fn error_summary(&self) -> Option<String> {
        if self.delivered {
            return None;
        }
        if self.attempts.is_empty() {
            return Some("no bots configured".to_string());
        }
        Some(
            self.attempts
                .iter()
                .map(|a| {
                    format!(
                        "{}: {}",
                        a.bot,
                        a.error.as_deref().unwrap_or("unknown error")
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

pub struct AlertDispatcher {
    telegram: TelegramClient,
    bots: Vec<BotToken>,
    order: Vec<String>,
    failure_threshold: u32,
    failures: Mutex<HashMap<String, u32>>,
}

impl AlertDispatcher {
    /// `failover_order` names bots by name; names without a configured token
    /// are skipped. A `failure_threshold` of 0 disables demotion.
    pub fn new(
        telegram: TelegramClient,
        bots: Vec<BotToken>,
        failover_order: &[String],
        failure_threshold: u32,
    ) -> Self {
        let mut order: Vec<String> = Vec::new();
        for name in failover_order {
            if order.contains(name) {
                continue;
            }
            if bots.iter().any(|b| &b.name == name) {
                order.push(name.clone());
            } else {
                tracing::warn!(bot = %name, "Bot in failover order has no token, skipping");
            }
        }

        tracing::info!(
            configured = bots.len(),
            failover_order = ?order,
            failure_threshold,
            "Alert dispatcher ready"
        );

        Self {
            telegram,
            bots,
            order,
            failure_threshold,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let policy = RetryPolicy {
            max_retries: config.alert_max_retries,
            timeout: Duration::from_secs(config.alert_timeout_secs),
            backoff_base: Duration::from_millis(config.alert_backoff_base_ms),
        };
        let telegram = TelegramClient::new(config.telegram_api_base.clone(), policy)?;
        Ok(Self::new(
            telegram,
            config.bots.clone(),
            &config.failover_order,
            config.alert_failure_threshold,
        ))
    }

    /// Names of every configured bot, failover bots first.
    pub fn bot_names(&self) -> Vec<String> {
        let mut names = self.order.clone();
        for bot in &self.bots {
            if !names.contains(&bot.name) {
                names.push(bot.name.clone());
            }
        }
        names
    }

    pub fn has_bot(&self, name: &str) -> bool {
        self.bots.iter().any(|b| b.name == name)
    }

    /// Deliver through the failover order.
    pub async fn dispatch(&self, message: &OutboundMessage) -> DispatchReport {
        self.dispatch_ordered(None, message).await
    }

    /// Deliver through `bot` first, then the rest of the failover order.
    pub async fn dispatch_preferring(&self, bot: &str, message: &OutboundMessage) -> DispatchReport {
        self.dispatch_ordered(Some(bot), message).await
    }

    async fn dispatch_ordered(
        &self,
        preferred: Option<&str>,
        message: &OutboundMessage,
    ) -> DispatchReport {
        let candidates = self.effective_order(preferred);
        if candidates.is_empty() {
            tracing::error!("No bots configured, alert dropped");
            return DispatchReport::no_bots();
        }

        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last_response = Value::Null;

        for bot in candidates {
            match self.telegram.send_message(&bot.token, message).await {
                Ok(resp) if resp.ok => {
                    self.record_success(&bot.name);
                    attempts.push(BotAttempt {
                        bot: bot.name.clone(),
                        ok: true,
                        error: None,
                    });
                    tracing::info!(
                        bot = %bot.name,
                        attempts = attempts.len(),
                        "Alert delivered"
                    );
                    return DispatchReport {
                        delivered: true,
                        delivered_by: Some(bot.name.clone()),
                        attempts,
                        response: serde_json::to_value(&resp).unwrap_or(Value::Null),
                    };
                }
                Ok(resp) => {
                    let reason = resp.failure_reason();
                    self.record_failure(&bot.name, &reason);
                    attempts.push(BotAttempt {
                        bot: bot.name.clone(),
                        ok: false,
                        error: Some(reason),
                    });
                    last_response = serde_json::to_value(&resp).unwrap_or(Value::Null);
                }
                Err(failure) => {
                    self.record_failure(&bot.name, &failure.message);
                    attempts.push(BotAttempt {
                        bot: bot.name.clone(),
                        ok: false,
                        error: Some(failure.message.clone()),
                    });
                    last_response = failure.to_json();
                }
            }
        }

        tracing::error!(attempts = attempts.len(), "Alert undeliverable on every bot");
        DispatchReport {
            delivered: false,
            delivered_by: None,
            attempts,
            response: last_response,
        }
    }

    /// The bots to try, in order, for one message.
    ///
    /// An explicitly requested bot always goes first, even when demoted;
    /// demotion only reorders the failover bots behind it.
    fn effective_order(&self, preferred: Option<&str>) -> Vec<&BotToken> {
        let preferred = preferred.filter(|bot| {
            let known = self.has_bot(*bot);
            if !known {
                tracing::warn!(bot = *bot, "Preferred bot has no token, using failover order");
            }
            known
        });

        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let demoted = |name: &str| {
            self.failure_threshold > 0
                && failures.get(name).copied().unwrap_or(0) >= self.failure_threshold
        };
        let (healthy, tripped): (Vec<&str>, Vec<&str>) = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|name| Some(*name) != preferred)
            .partition(|name| !demoted(*name));

        preferred
            .into_iter()
            .chain(healthy)
            .chain(tripped)
            .filter_map(|name| self.bots.iter().find(|b| b.name == name))
            .collect()
    }

    fn record_success(&self, bot: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let was_demoted = failures
            .remove(bot)
            .is_some_and(|n| self.failure_threshold > 0 && n >= self.failure_threshold);
        if was_demoted {
            tracing::info!(bot, "Bot recovered, restoring failover position");
        }
    }

    fn record_failure(&self, bot: &str, reason: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let count = failures.entry(bot.to_string()).or_insert(0);
        *count += 1;
        tracing::warn!(bot, consecutive_failures = *count, error = %reason, "Bot delivery failed");
        if self.failure_threshold > 0 && *count == self.failure_threshold {
            tracing::warn!(bot, "Bot demoted to the end of the failover order");
        }
    }

    /// Consecutive failure count per bot; bots at zero are omitted.
    pub fn failure_counts(&self) -> BTreeMap<String, u32> {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// `getMe` for every configured bot.
    pub async fn bot_status(&self) -> BTreeMap<String, bool> {
        let mut status = BTreeMap::new();
        for bot in &self.bots {
            status.insert(bot.name.clone(), self.telegram.get_me(&bot.token).await);
        }
        status
    }
}
