//! Intake route handlers.
//!
//! This is the thin wire surface the external channel webhook adapter
//! calls: it validates, enqueues, and answers. All processing happens in
//! the worker pool.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use lanca_core::{Error, InboundPayload, JobKind, NewJob};

use crate::state::AppState;

/// Error envelope for route handlers. Internal detail stays in the logs;
/// the body carries a short operator-facing message.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        warn!(error = %e, "Request failed");
        let status = match e {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::JobNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: match status {
                StatusCode::INTERNAL_SERVER_ERROR => "internal error".to_string(),
                _ => e.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Wire contract of the channel webhook adapter.
#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    pub chat_id: String,
    pub user_id: String,
    /// Explicit kind; omitted for plain text, which may also be a password
    /// reply for a parked PDF.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub media_data: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InboundResponse {
    pub job_id: Uuid,
    pub kind: JobKind,
}

/// `POST /v1/inbound` — accept one inbound item and enqueue its job.
pub async fn inbound(
    State(state): State<AppState>,
    Json(request): Json<InboundRequest>,
) -> Result<(StatusCode, Json<InboundResponse>), ApiError> {
    if request.chat_id.is_empty() || request.user_id.is_empty() {
        return Err(ApiError::bad_request("chat_id and user_id are required"));
    }

    let (kind, payload) = resolve_job(&state, &request).await?;

    let job_id = state
        .jobs
        .enqueue(NewJob::new(kind, request.chat_id.clone(), request.user_id.clone()).with_payload(payload))
        .await?;

    info!(
        job_id = %job_id,
        job_kind = ?kind,
        chat_id = %request.chat_id,
        "Inbound job enqueued"
    );

    Ok((StatusCode::ACCEPTED, Json(InboundResponse { job_id, kind })))
}

/// Decide the job kind for a request. Plain text while a PDF is parked for
/// the user is the password reply, which becomes a `RetryPdfPassword` job.
async fn resolve_job(
    state: &AppState,
    request: &InboundRequest,
) -> Result<(JobKind, InboundPayload), ApiError> {
    let mut payload = InboundPayload {
        media_data: request.media_data.clone(),
        mime_type: request.mime_type.clone(),
        filename: request.filename.clone(),
        body: request.body.clone(),
        password: None,
    };

    if let Some(kind_str) = request.kind.as_deref() {
        let kind: JobKind = serde_json::from_value(json!(kind_str))
            .map_err(|_| ApiError::bad_request(format!("unsupported kind: {kind_str}")))?;
        return Ok((kind, payload));
    }

    let Some(body) = request.body.as_deref().filter(|b| !b.trim().is_empty()) else {
        return Err(ApiError::bad_request("either kind or body is required"));
    };

    if state.sessions.pdf_flow(&request.user_id).await?.is_awaiting() {
        payload.password = Some(body.trim().to_string());
        payload.body = None;
        return Ok((JobKind::RetryPdfPassword, payload));
    }

    Ok((JobKind::Text, payload))
}

/// `POST /v1/session/{user_id}/reset` — forget everything about a user.
pub async fn reset_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.sessions.clear_context(&user_id).await?;
    state.sessions.clear_pending_pdf(&user_id).await?;
    state.sessions.clear_pending_correction(&user_id).await?;

    info!(user_id = %user_id, "Session cleared");
    Ok(Json(json!({ "status": "cleared" })))
}

/// `GET /v1/queue/stats` — inbound queue statistics plus the outbound
/// backlog.
pub async fn queue_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.jobs.queue_stats().await?;
    let outbound_pending = state.outbound.pending_count().await?;

    Ok(Json(json!({
        "inbound": stats,
        "outbound_pending": outbound_pending,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Job listing entry; the media payload is deliberately omitted.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: lanca_core::JobStatus,
    pub chat_id: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `GET /v1/jobs` — filtered job listing, newest first. The main use is
/// inspecting parked (`status=failed`) jobs.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let jobs = state
        .jobs
        .list_filtered(
            query.status.as_deref(),
            query.kind.as_deref(),
            query.limit.clamp(1, 500),
            query.offset.max(0),
        )
        .await?;

    Ok(Json(
        jobs.into_iter()
            .map(|job| JobSummary {
                id: job.id,
                kind: job.kind,
                status: job.status,
                chat_id: job.chat_id,
                retry_count: job.retry_count,
                error_message: job.error_message,
                created_at: job.created_at,
                completed_at: job.completed_at,
            })
            .collect(),
    ))
}

/// `GET /health` — database ping plus per-strategy health.
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let strategies: serde_json::Map<String, serde_json::Value> = state
        .registry
        .health_check_all()
        .await
        .into_iter()
        .map(|(kind, healthy)| (kind.to_string(), json!(healthy)))
        .collect();

    let status = if database { "ok" } else { "degraded" };
    Ok(Json(json!({
        "status": status,
        "database": database,
        "strategies": strategies,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_request_minimal_deserialization() {
        let request: InboundRequest = serde_json::from_value(json!({
            "chat_id": "c1",
            "user_id": "u1",
            "body": "gastei 20"
        }))
        .unwrap();
        assert!(request.kind.is_none());
        assert_eq!(request.body.as_deref(), Some("gastei 20"));
    }

    #[test]
    fn test_kind_string_parses_like_wire_enum() {
        let kind: JobKind = serde_json::from_value(json!("xlsx")).unwrap();
        assert_eq!(kind, JobKind::Xlsx);
        assert!(serde_json::from_value::<JobKind>(json!("tarball")).is_err());
    }

    #[test]
    fn test_default_limit() {
        let query: ListJobsQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
    }
}
