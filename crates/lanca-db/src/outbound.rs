//! Outbound reply queue implementation.
//!
//! A second, smaller durable queue so that slow or failing channel sends
//! never block extraction workers. Same claim/complete/fail shape as the
//! inbound queue; per-chat ordering is best-effort only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use lanca_core::defaults::{JOB_RETRY_BASE_SECS, OUTBOUND_MAX_RETRIES};
use lanca_core::{Error, OutboundMessage, OutboundPayload, OutboundQueue, Result};

/// PostgreSQL implementation of the outbound reply queue.
pub struct PgOutboundQueue {
    pool: Pool<Postgres>,
    notify: Arc<Notify>,
}

impl PgOutboundQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Notification handle for event-driven sender wake.
    pub fn send_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Result<OutboundMessage> {
        let payload: OutboundPayload = serde_json::from_value(row.get::<JsonValue, _>("payload"))?;
        Ok(OutboundMessage {
            id: row.get("id"),
            chat_id: row.get("chat_id"),
            payload,
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            run_at: row.get("run_at"),
            created_at: row.get("created_at"),
        })
    }

    fn backoff_secs(retry_count: i32) -> i64 {
        JOB_RETRY_BASE_SECS * (1i64 << retry_count.clamp(0, 16))
    }
}

#[async_trait]
impl OutboundQueue for PgOutboundQueue {
    async fn enqueue(&self, chat_id: &str, payload: OutboundPayload) -> Result<Uuid> {
        if chat_id.is_empty() {
            return Err(Error::InvalidInput("chat_id must not be empty".into()));
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        let payload_json = serde_json::to_value(&payload)?;

        sqlx::query(
            "INSERT INTO outbound_queue (id, chat_id, payload, status, max_retries, run_at, created_at)
             VALUES ($1, $2, $3, 'pending'::job_status, $4, $5, $5)",
        )
        .bind(id)
        .bind(chat_id)
        .bind(&payload_json)
        .bind(OUTBOUND_MAX_RETRIES)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<OutboundMessage>> {
        let now = Utc::now();

        let row = sqlx::query(
            "UPDATE outbound_queue
             SET status = 'running'::job_status
             WHERE id = (
                 SELECT id FROM outbound_queue
                 WHERE status = 'pending'::job_status AND run_at <= $1
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, chat_id, payload, retry_count, max_retries, run_at, created_at",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn complete(&self, message_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE outbound_queue
             SET status = 'completed'::job_status, completed_at = $1
             WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, message_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM outbound_queue WHERE id = $1")
                .bind(message_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if retry_count < max_retries {
            let run_at = now + ChronoDuration::seconds(Self::backoff_secs(retry_count));
            sqlx::query(
                "UPDATE outbound_queue
                 SET status = 'pending'::job_status, retry_count = $1, error_message = $2, run_at = $3
                 WHERE id = $4",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(run_at)
            .bind(message_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE outbound_queue
                 SET status = 'failed'::job_status, completed_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(message_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbound_queue WHERE status = 'pending'::job_status",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_backoff_is_exponential() {
        assert_eq!(PgOutboundQueue::backoff_secs(0), JOB_RETRY_BASE_SECS);
        assert_eq!(PgOutboundQueue::backoff_secs(2), JOB_RETRY_BASE_SECS * 4);
    }

    #[test]
    fn test_payload_round_trip_through_json() {
        let payload = OutboundPayload::Text {
            body: "Lançamento registrado.".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        let back: OutboundPayload = serde_json::from_value(json).unwrap();
        match back {
            OutboundPayload::Text { body } => assert_eq!(body, "Lançamento registrado."),
            _ => panic!("wrong variant"),
        }
    }
}
