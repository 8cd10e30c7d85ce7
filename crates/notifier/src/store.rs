//! Delivery log backed by the `deliveries` table.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use empire_common::types::{Delivery, DeliveryStatus, OutboundMessage};

use crate::dispatcher::DispatchReport;

#[derive(Clone)]
pub struct DeliveryRecorder {
    pool: SqlitePool,
}

impl DeliveryRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist the outcome of one queued message.
    pub async fn record(
        &self,
        id: Uuid,
        requested_bot: &str,
        message: &OutboundMessage,
        report: &DispatchReport,
    ) -> Result<(), sqlx::Error> {
        let status = if report.delivered {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        };

        sqlx::query(
            r#"
            INSERT INTO deliveries (id, requested_bot, delivered_by, chat_id, text, status, attempts, error_detail, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(requested_bot)
        .bind(report.delivered_by.as_deref())
        .bind(&message.chat_id)
        .bind(&message.text)
        .bind(status.to_string())
        .bind(report.attempts.len() as i64)
        .bind(report.error_summary())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest deliveries first, optionally only those with `status`.
    pub async fn list(
        &self,
        status: Option<DeliveryStatus>,
        limit: i64,
    ) -> Result<Vec<Delivery>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, requested_bot, delivered_by, chat_id, text, status, attempts, error_detail, created_at
            FROM deliveries
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
