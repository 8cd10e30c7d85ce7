//! Shopify order log.

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

use empire_common::error::AppError;
use empire_common::types::Order;

/// The fields of a Shopify order payload that the order log uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopifyOrder {
    pub order_id: String,
    pub amount: f64,
    pub billing_country: Option<String>,
    pub shipping_country: Option<String>,
}

impl ShopifyOrder {
    /// Extract an order from a webhook body.
    ///
    /// `id` may be a number or a string and is required. `total_price` may be
    /// a number or a decimal string; it defaults to 0 when absent.
    pub fn from_json(value: &Value) -> Result<Self, AppError> {
        let order_id = match value.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(AppError::Validation("order id is required".to_string())),
        };

        let amount = match value.get("total_price") {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
                AppError::Validation(format!("total_price '{}' is not a number", s))
            })?,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "total_price has unexpected type: {}",
                    other
                )));
            }
        };
        if !amount.is_finite() {
            return Err(AppError::Validation("total_price must be finite".to_string()));
        }

        Ok(Self {
            order_id,
            amount,
            billing_country: country(value, "billing_address"),
            shipping_country: country(value, "shipping_address"),
        })
    }
}

fn country(value: &Value, address: &str) -> Option<String> {
    value
        .get(address)?
        .get("country")?
        .as_str()
        .map(str::to_string)
}

/// Whether the order was new.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Processed(Order),
    Duplicate,
}

/// Alert line for a new order, e.g. `💰 Order: $1234.50 | Risk: 70%`.
pub fn alert_text(amount: f64, fraud_score: f64) -> String {
    format!(
        "💰 Order: ${:.2} | Risk: {}%",
        amount,
        (fraud_score * 100.0).round() as i64
    )
}

pub struct OrderService;

impl OrderService {
    /// Insert an order; a repeated `order_id` is reported as a duplicate.
    pub async fn record(
        pool: &SqlitePool,
        order: &ShopifyOrder,
        fraud_score: f64,
    ) -> Result<RecordOutcome, AppError> {
        let inserted: Option<Order> = sqlx::query_as(
            r#"
            INSERT INTO orders (order_id, amount, fraud_score, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING id, order_id, amount, fraud_score, created_at
            "#,
        )
        .bind(&order.order_id)
        .bind(order.amount)
        .bind(fraud_score)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(row) => {
                tracing::info!(
                    order_id = %row.order_id,
                    amount = row.amount,
                    fraud_score = row.fraud_score,
                    "Order recorded"
                );
                Ok(RecordOutcome::Processed(row))
            }
            None => {
                tracing::info!(order_id = %order.order_id, "Duplicate order webhook ignored");
                Ok(RecordOutcome::Duplicate)
            }
        }
    }

    /// Most recent orders first.
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Order>, AppError> {
        let orders = sqlx::query_as(
            "SELECT id, order_id, amount, fraud_score, created_at FROM orders ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }
}
