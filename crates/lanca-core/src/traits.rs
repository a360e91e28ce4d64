//! Trait definitions for the seams between lanca subsystems.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::{
    CanonicalTransaction, InboundItem, Job, JobKind, MediaKind, NewJob, OutboundMessage,
    OutboundPayload, PdfFlow, QueueStats, SessionTurn, StrategyResult,
};
use crate::Result;

// =============================================================================
// QUEUE TRAITS
// =============================================================================

/// Durable inbound job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a new job. Non-blocking; once this returns, the job survives
    /// a worker crash.
    async fn enqueue(&self, job: NewJob) -> Result<Uuid>;

    /// Claim the next runnable job whose kind is in `kinds`.
    /// An empty slice means "claim any kind".
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<Job>>;

    /// Mark a job as completed (acknowledges and removes it from delivery).
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark a job attempt as failed. Re-schedules with backoff while
    /// attempts remain, otherwise parks the job as failed.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Get a job by ID.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Count of jobs currently claimable or scheduled.
    async fn pending_count(&self) -> Result<i64>;

    /// List jobs with optional status/kind filters, newest first.
    async fn list_filtered(
        &self,
        status: Option<&str>,
        kind: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>>;

    /// Queue statistics.
    async fn queue_stats(&self) -> Result<QueueStats>;

    /// Delete old terminal jobs, keeping the most recent `keep_count`.
    async fn cleanup(&self, keep_count: i64) -> Result<i64>;
}

/// Durable outbound reply queue.
#[async_trait]
pub trait OutboundQueue: Send + Sync {
    /// Enqueue a reply for delivery.
    async fn enqueue(&self, chat_id: &str, payload: OutboundPayload) -> Result<Uuid>;

    /// Claim the next deliverable reply.
    async fn claim_next(&self) -> Result<Option<OutboundMessage>>;

    /// Acknowledge a delivered reply.
    async fn complete(&self, message_id: Uuid) -> Result<()>;

    /// Record a failed send; re-schedules with backoff while attempts remain.
    async fn fail(&self, message_id: Uuid, error: &str) -> Result<()>;

    /// Count of replies awaiting delivery.
    async fn pending_count(&self) -> Result<i64>;
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Storage for canonical transactions.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persist a batch atomically. Returns the stored record IDs in input
    /// order.
    async fn create_many(&self, items: &[CanonicalTransaction]) -> Result<Vec<Uuid>>;

    /// Most recent transactions for a user.
    async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<CanonicalTransaction>>;
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Short-lived per-user conversational state. All operations are per-key;
/// concurrent writers are last-write-wins by contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Ordered conversation turns for a user (empty when none/expired).
    async fn get_context(&self, user_id: &str) -> Result<Vec<SessionTurn>>;

    /// Replace the user's context with `turns`, expiring after `ttl_secs`.
    async fn set_context(&self, user_id: &str, turns: &[SessionTurn], ttl_secs: u64) -> Result<()>;

    /// Drop the user's context.
    async fn clear_context(&self, user_id: &str) -> Result<()>;

    /// Park an encrypted PDF (base64) awaiting a password.
    async fn set_pending_pdf(&self, user_id: &str, pdf_base64: &str, ttl_secs: u64) -> Result<()>;

    /// The parked PDF, if any and not expired.
    async fn get_pending_pdf(&self, user_id: &str) -> Result<Option<String>>;

    /// Drop the parked PDF.
    async fn clear_pending_pdf(&self, user_id: &str) -> Result<()>;

    /// Park a pending correction payload.
    async fn set_pending_correction(
        &self,
        user_id: &str,
        correction: &JsonValue,
        ttl_secs: u64,
    ) -> Result<()>;

    /// The pending correction, if any.
    async fn get_pending_correction(&self, user_id: &str) -> Result<Option<JsonValue>>;

    /// Drop the pending correction.
    async fn clear_pending_correction(&self, user_id: &str) -> Result<()>;

    /// The user's position in the password-retry state machine.
    async fn pdf_flow(&self, user_id: &str) -> Result<PdfFlow> {
        Ok(match self.get_pending_pdf(user_id).await? {
            Some(pdf_base64) => PdfFlow::AwaitingPassword { pdf_base64 },
            None => PdfFlow::Idle,
        })
    }
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// EXTRACTION STRATEGIES
// =============================================================================

/// Format-specific extraction routine.
///
/// Each strategy handles one input kind and is registered in a
/// `StrategyRegistry`, dispatched on the job's media kind. Expected,
/// recoverable failures (unsupported format, corrupt file, wrong password)
/// come back as `Ok(StrategyResult::SystemError(..))`; an `Err` is an
/// unexpected/transient failure and triggers queue-level redelivery.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// The input kind this strategy handles.
    fn kind(&self) -> MediaKind;

    /// Extract from one inbound item.
    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult>;

    /// Check if the strategy's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this strategy.
    fn name(&self) -> &str;
}

// =============================================================================
// OUTBOUND TRANSPORT
// =============================================================================

/// The channel send transport (external). Implementations deliver one reply
/// and return an error on failure so the outbound queue can retry.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    /// Send a plain-text reply.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Send a media reply (base64-encoded data).
    async fn send_media(
        &self,
        chat_id: &str,
        mimetype: &str,
        data: &str,
        filename: &str,
    ) -> Result<()>;
}

// =============================================================================
// CURRENCY CONVERSION
// =============================================================================

/// Result of a currency conversion lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub converted_value: f64,
    pub exchange_rate: f64,
}

/// External exchange-rate service.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Convert `amount` from `from` into `to`.
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion>;
}
