//! Inbound job queue implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use lanca_core::defaults::JOB_RETRY_BASE_SECS;
use lanca_core::{
    Error, InboundPayload, Job, JobKind, JobQueue, JobStatus, NewJob, QueueStats, Result,
};

/// PostgreSQL implementation of the inbound job queue.
///
/// Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never hand the
/// same job to two handlers. Failed attempts are re-scheduled with
/// exponential backoff via the `run_at` column until `max_retries` is
/// exhausted, after which the job is parked as `failed` for inspection.
pub struct PgJobQueue {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgJobQueue {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Convert JobKind to string for the database enum.
    fn job_kind_to_str(kind: JobKind) -> &'static str {
        match kind {
            JobKind::Image => "image",
            JobKind::Audio => "audio",
            JobKind::Pdf => "pdf",
            JobKind::Ofx => "ofx",
            JobKind::Csv => "csv",
            JobKind::Xlsx => "xlsx",
            JobKind::Text => "text",
            JobKind::RetryPdfPassword => "retry_pdf_password",
        }
    }

    /// Convert string from the database to JobKind.
    fn str_to_job_kind(s: &str) -> JobKind {
        match s {
            "image" => JobKind::Image,
            "audio" => JobKind::Audio,
            "pdf" => JobKind::Pdf,
            "ofx" => JobKind::Ofx,
            "csv" => JobKind::Csv,
            "xlsx" => JobKind::Xlsx,
            "retry_pdf_password" => JobKind::RetryPdfPassword,
            _ => JobKind::Text, // fallback
        }
    }

    /// Convert string from the database to JobStatus.
    fn str_to_job_status(s: &str) -> JobStatus {
        match s {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending, // fallback
        }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        let payload: InboundPayload = row
            .try_get::<JsonValue, _>("payload")
            .ok()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Job {
            id: row.get("id"),
            kind: Self::str_to_job_kind(row.get("kind")),
            status: Self::str_to_job_status(row.get("status")),
            chat_id: row.get("chat_id"),
            user_id: row.get("user_id"),
            priority: row.get("priority"),
            payload,
            result: row.get("result"),
            error_message: row.get("error_message"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            run_at: row.get("run_at"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }
    }

    /// Backoff delay before attempt `retry_count + 1`.
    fn backoff_secs(retry_count: i32) -> i64 {
        JOB_RETRY_BASE_SECS * (1i64 << retry_count.clamp(0, 16))
    }
}

const JOB_COLUMNS: &str = "id, kind::text, status::text, chat_id, user_id, priority, payload, \
     result, error_message, retry_count, max_retries, run_at, created_at, started_at, completed_at";

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: NewJob) -> Result<Uuid> {
        if job.chat_id.is_empty() || job.user_id.is_empty() {
            return Err(Error::InvalidInput(
                "chat_id and user_id must not be empty".into(),
            ));
        }

        let job_id = Uuid::now_v7();
        let now = Utc::now();
        let payload = serde_json::to_value(&job.payload)?;

        sqlx::query(
            "INSERT INTO inbound_jobs (id, kind, status, chat_id, user_id, priority, payload, run_at, created_at)
             VALUES ($1, $2::job_kind, 'pending'::job_status, $3, $4, $5, $6, $7, $7)",
        )
        .bind(job_id)
        .bind(Self::job_kind_to_str(job.kind))
        .bind(&job.chat_id)
        .bind(&job.user_id)
        .bind(job.priority)
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(job_id)
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>> {
        let now = Utc::now();
        let kind_strings: Vec<String> = kinds
            .iter()
            .map(|k| Self::job_kind_to_str(*k).to_string())
            .collect();

        // Filter by kind BEFORE locking; FOR UPDATE SKIP LOCKED keeps
        // concurrent claimers from contending on the same row. run_at
        // implements the retry backoff schedule.
        let query = format!(
            "UPDATE inbound_jobs
             SET status = 'running'::job_status, started_at = $1
             WHERE id = (
                 SELECT id FROM inbound_jobs
                 WHERE status = 'pending'::job_status
                   AND run_at <= $1
                   AND (cardinality($2::text[]) = 0 OR kind::text = ANY($2))
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(&kind_strings)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            "UPDATE inbound_jobs
             SET status = 'completed'::job_status, completed_at = $1, result = $2
             WHERE id = $3",
        )
        .bind(now)
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM inbound_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if retry_count < max_retries {
            // Retry: back to pending, scheduled after the backoff window.
            let run_at = now + ChronoDuration::seconds(Self::backoff_secs(retry_count));
            sqlx::query(
                "UPDATE inbound_jobs
                 SET status = 'pending'::job_status, retry_count = $1, error_message = $2,
                     started_at = NULL, run_at = $3
                 WHERE id = $4",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(run_at)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            // Max retries exceeded: park for inspection.
            sqlx::query(
                "UPDATE inbound_jobs
                 SET status = 'failed'::job_status, completed_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let query = format!("SELECT {JOB_COLUMNS} FROM inbound_jobs WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inbound_jobs WHERE status = 'pending'::job_status",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn list_filtered(
        &self,
        status: Option<&str>,
        kind: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>> {
        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if status.is_some() {
            conditions.push(format!("status::text = ${}", param_idx));
            param_idx += 1;
        }
        if kind.is_some() {
            conditions.push(format!("kind::text = ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {JOB_COLUMNS} FROM inbound_jobs
             {}
             ORDER BY created_at DESC
             LIMIT ${} OFFSET ${}",
            where_clause,
            param_idx,
            param_idx + 1
        );

        let mut q = sqlx::query(&query);
        if let Some(s) = status {
            q = q.bind(s);
        }
        if let Some(k) = kind {
            q = q.bind(k);
        }
        q = q.bind(limit).bind(offset);

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_job_row).collect())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'running') as running,
                COUNT(*) FILTER (WHERE status = 'completed' AND completed_at > NOW() - INTERVAL '1 hour') as completed_last_hour,
                COUNT(*) FILTER (WHERE status = 'failed' AND completed_at > NOW() - INTERVAL '1 hour') as failed_last_hour,
                COUNT(*) as total
             FROM inbound_jobs"
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            running: row.get::<i64, _>("running"),
            completed_last_hour: row.get::<i64, _>("completed_last_hour"),
            failed_last_hour: row.get::<i64, _>("failed_last_hour"),
            total: row.get::<i64, _>("total"),
        })
    }

    async fn cleanup(&self, keep_count: i64) -> Result<i64> {
        let result = sqlx::query(
            "DELETE FROM inbound_jobs
             WHERE id NOT IN (
                 SELECT id FROM inbound_jobs
                 ORDER BY
                     CASE WHEN status IN ('pending', 'running') THEN 0 ELSE 1 END,
                     completed_at DESC NULLS LAST
                 LIMIT $1
             )",
        )
        .bind(keep_count)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() as i64)
    }
}
