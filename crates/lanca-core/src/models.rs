//! Core domain models for lanca.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::airesponse::RawAiResponse;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the inbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Kind of inbound job. Immutable once enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Photo or scanned receipt
    Image,
    /// Voice note / audio message
    Audio,
    /// PDF document (possibly password-protected)
    Pdf,
    /// OFX bank export
    Ofx,
    /// CSV export
    Csv,
    /// Spreadsheet (xlsx/xls/ods)
    Xlsx,
    /// Free-text chat message
    Text,
    /// Re-attempt a stored encrypted PDF with a user-supplied password
    RetryPdfPassword,
}

impl JobKind {
    /// Default priority for this job kind (higher = more urgent).
    pub fn default_priority(&self) -> i32 {
        match self {
            // The user is actively waiting in the password sub-flow and the
            // stored PDF expires in minutes, so retries jump the queue.
            JobKind::RetryPdfPassword => 8,
            JobKind::Text => 6,
            JobKind::Image | JobKind::Audio | JobKind::Pdf => 5,
            // Bulk exports are the slow lane.
            JobKind::Ofx | JobKind::Csv | JobKind::Xlsx => 3,
        }
    }

    /// The media kind whose strategy handles this job.
    ///
    /// `RetryPdfPassword` maps to the PDF strategy's password entry point.
    pub fn media_kind(&self) -> MediaKind {
        match self {
            JobKind::Image => MediaKind::Image,
            JobKind::Audio => MediaKind::Audio,
            JobKind::Pdf | JobKind::RetryPdfPassword => MediaKind::Pdf,
            JobKind::Ofx => MediaKind::Ofx,
            JobKind::Csv => MediaKind::Csv,
            JobKind::Xlsx => MediaKind::Xlsx,
            JobKind::Text => MediaKind::Text,
        }
    }
}

/// Input kind a strategy is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
    Pdf,
    Ofx,
    Csv,
    Xlsx,
    Text,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Pdf => "pdf",
            MediaKind::Ofx => "ofx",
            MediaKind::Csv => "csv",
            MediaKind::Xlsx => "xlsx",
            MediaKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// Wire payload carried by an inbound job, as handed over by the channel
/// webhook adapter. All fields are optional at the wire level; the
/// orchestrator decides what a given kind requires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundPayload {
    /// Base64-encoded media bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Message text: the caption on media, or the whole message for text jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Only set on `RetryPdfPassword` jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// One unit of queued work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub chat_id: String,
    pub user_id: String,
    pub priority: i32,
    pub payload: InboundPayload,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Earliest time the job may be claimed; pushed out on retry backoff.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters for enqueueing a new inbound job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub chat_id: String,
    pub user_id: String,
    pub priority: i32,
    pub payload: InboundPayload,
}

impl NewJob {
    /// Build a job with the kind's default priority.
    pub fn new(kind: JobKind, chat_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            kind,
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            priority: kind.default_priority(),
            payload: InboundPayload::default(),
        }
    }

    pub fn with_payload(mut self, payload: InboundPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    pub total: i64,
}

// =============================================================================
// STRATEGY INPUT / OUTPUT
// =============================================================================

/// Normalized view of one inbound media item, as handed to a strategy.
#[derive(Debug, Clone)]
pub struct InboundItem {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
    pub caption: Option<String>,
}

impl InboundItem {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            filename: filename.into(),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption;
        self
    }
}

/// Outcome of one strategy invocation. Exactly one variant per run.
#[derive(Debug, Clone)]
pub enum StrategyResult {
    /// Structured model output ready for normalization.
    DataExtraction(RawAiResponse),
    /// A full conversational turn: the model (or the user) produced plain
    /// text. May still carry an embedded JSON payload; the orchestrator
    /// decides.
    TextCommand(String),
    /// Expected, recoverable failure surfaced directly to the user.
    SystemError(String),
    /// The PDF is encrypted; bytes are parked until a password arrives.
    PdfPasswordRequest(Vec<u8>),
}

// =============================================================================
// CANONICAL TRANSACTIONS
// =============================================================================

/// Income vs. expense marker on a ledger entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    #[default]
    Expense,
}

impl EntryKind {
    /// Parse the model's loose `tipo` field; anything unrecognized is an
    /// expense.
    pub fn from_wire(s: Option<&str>) -> Self {
        match s.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("income") | Some("receita") | Some("entrada") => EntryKind::Income,
            _ => EntryKind::Expense,
        }
    }
}

/// Persistence status derived from the confidence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Confirmed,
    PendingReview,
}

/// A normalized item before currency/embedding enrichment and gating.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub kind: EntryKind,
    pub date: NaiveDate,
    /// Currency marker as reported by the model; `None` means home currency.
    pub currency: Option<String>,
}

/// A fully enriched, gated ledger entry ready for storage. Field names on
/// the wire match the persistence schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    #[serde(rename = "descricao")]
    pub description: String,
    /// Amount in the original currency. Never discarded on conversion.
    #[serde(rename = "valor")]
    pub amount: f64,
    #[serde(rename = "valor_convertido", skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<f64>,
    #[serde(rename = "moeda_original")]
    pub original_currency: String,
    #[serde(rename = "taxa_cambio", skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<f64>,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "tipo")]
    pub kind: EntryKind,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    pub status: ReviewStatus,
    pub is_validated: bool,
    /// Always false at creation; flipped only by an explicit user correction.
    pub is_human_corrected: bool,
    pub user_id: String,
    /// Similarity-search vector; best-effort, nullable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Gate output: one storage-ready batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBatch {
    pub status: ReviewStatus,
    #[serde(rename = "payload")]
    pub items: Vec<CanonicalTransaction>,
}

// =============================================================================
// OUTBOUND REPLIES
// =============================================================================

/// Payload of one outbound reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundPayload {
    Text {
        body: String,
    },
    Media {
        mimetype: String,
        /// Base64-encoded bytes.
        data: String,
        filename: String,
    },
}

/// One queued reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub chat_id: String,
    pub payload: OutboundPayload,
    pub retry_count: i32,
    pub max_retries: i32,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of per-user conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTurn {
    pub role: TurnRole,
    pub content: String,
}

impl SessionTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Explicit form of the password-retry flow per user. The session store
/// only holds a TTL'd blob; this enum is the two states that blob encodes.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfFlow {
    Idle,
    /// A password-protected document is parked and a password is expected.
    AwaitingPassword {
        /// Base64 of the encrypted PDF as stored.
        pdf_base64: String,
    },
}

impl PdfFlow {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, PdfFlow::AwaitingPassword { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_media_kind_mapping() {
        assert_eq!(JobKind::Image.media_kind(), MediaKind::Image);
        assert_eq!(JobKind::Audio.media_kind(), MediaKind::Audio);
        assert_eq!(JobKind::Pdf.media_kind(), MediaKind::Pdf);
        assert_eq!(JobKind::RetryPdfPassword.media_kind(), MediaKind::Pdf);
        assert_eq!(JobKind::Ofx.media_kind(), MediaKind::Ofx);
        assert_eq!(JobKind::Csv.media_kind(), MediaKind::Csv);
        assert_eq!(JobKind::Xlsx.media_kind(), MediaKind::Xlsx);
        assert_eq!(JobKind::Text.media_kind(), MediaKind::Text);
    }

    #[test]
    fn test_retry_password_outranks_media_jobs() {
        assert!(
            JobKind::RetryPdfPassword.default_priority() > JobKind::Pdf.default_priority(),
            "password retries must jump the queue before the stored PDF expires"
        );
    }

    #[test]
    fn test_job_kind_serde_snake_case() {
        let json = serde_json::to_string(&JobKind::RetryPdfPassword).unwrap();
        assert_eq!(json, "\"retry_pdf_password\"");
        let back: JobKind = serde_json::from_str("\"xlsx\"").unwrap();
        assert_eq!(back, JobKind::Xlsx);
    }

    #[test]
    fn test_entry_kind_from_wire() {
        assert_eq!(EntryKind::from_wire(Some("income")), EntryKind::Income);
        assert_eq!(EntryKind::from_wire(Some("receita")), EntryKind::Income);
        assert_eq!(EntryKind::from_wire(Some("expense")), EntryKind::Expense);
        assert_eq!(EntryKind::from_wire(Some("garbage")), EntryKind::Expense);
        assert_eq!(EntryKind::from_wire(None), EntryKind::Expense);
    }

    #[test]
    fn test_review_status_serde() {
        assert_eq!(
            serde_json::to_string(&ReviewStatus::PendingReview).unwrap(),
            "\"pending_review\""
        );
        assert_eq!(
            serde_json::to_string(&ReviewStatus::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }

    #[test]
    fn test_canonical_transaction_wire_names() {
        let tx = CanonicalTransaction {
            description: "Mercado".into(),
            amount: 45.9,
            converted_amount: None,
            original_currency: "BRL".into(),
            exchange_rate: None,
            category: "Groceries".into(),
            kind: EntryKind::Expense,
            date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            status: ReviewStatus::Confirmed,
            is_validated: true,
            is_human_corrected: false,
            user_id: "u1".into(),
            embedding: None,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["descricao"], "Mercado");
        assert_eq!(json["valor"], 45.9);
        assert_eq!(json["moeda_original"], "BRL");
        assert_eq!(json["tipo"], "expense");
        assert_eq!(json["status"], "confirmed");
        assert!(json.get("valor_convertido").is_none());
        assert!(json.get("embedding").is_none());
    }

    #[test]
    fn test_review_batch_payload_field() {
        let batch = ReviewBatch {
            status: ReviewStatus::PendingReview,
            items: vec![],
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert!(json.get("payload").is_some());
        assert_eq!(json["status"], "pending_review");
    }

    #[test]
    fn test_outbound_payload_serde_roundtrip() {
        let text = OutboundPayload::Text {
            body: "oi".into(),
        };
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["type"], "text");

        let media = OutboundPayload::Media {
            mimetype: "application/pdf".into(),
            data: "aGk=".into(),
            filename: "report.pdf".into(),
        };
        let json = serde_json::to_string(&media).unwrap();
        let back: OutboundPayload = serde_json::from_str(&json).unwrap();
        match back {
            OutboundPayload::Media { filename, .. } => assert_eq!(filename, "report.pdf"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_inbound_payload_omits_absent_fields() {
        let payload = InboundPayload {
            body: Some("lunch 20".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["body"], "lunch 20");
        assert!(json.get("password").is_none());
        assert!(json.get("media_data").is_none());
    }

    #[test]
    fn test_pdf_flow_states() {
        assert!(!PdfFlow::Idle.is_awaiting());
        assert!(PdfFlow::AwaitingPassword {
            pdf_base64: "YWJj".into()
        }
        .is_awaiting());
    }

    #[test]
    fn test_new_job_uses_kind_default_priority() {
        let job = NewJob::new(JobKind::Csv, "chat-1", "user-1");
        assert_eq!(job.priority, JobKind::Csv.default_priority());
        assert_eq!(job.chat_id, "chat-1");
    }
}
