//! The pipeline orchestrator: the worker's job handler.
//!
//! One inbound job comes in; exactly one outbound reply leaves, on the
//! job's terminal outcome. Strategies report expected failures as
//! `SystemError` results; anything that errors out of here is a transient
//! failure and goes back to the queue for backoff redelivery, notifying
//! the user only on the final attempt.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info, warn};

use lanca_core::defaults::{
    SESSION_CONTEXT_MAX_TURNS, SESSION_CONTEXT_TTL_SECS, SESSION_PDF_TTL_SECS,
};
use lanca_core::{
    parse_embedded, CurrencyConverter, EmbeddingBackend, InboundItem, Job, JobKind,
    OutboundPayload, OutboundQueue, RawAiResponse, Result, ReviewBatch, ReviewStatus,
    SessionStore, SessionTurn, StrategyResult, TransactionRepository,
};

use crate::confidence;
use crate::enrich::{enrich, Enrichment};
use crate::handler::{JobContext, JobHandler, JobResult};
use crate::normalize::normalize;
use crate::prompts::conversation_prompt;
use crate::registry::StrategyRegistry;
use crate::strategies::PdfPasswordEntry;

/// Generic failure notice; sent only on a job's final attempt.
const GENERIC_FAILURE: &str =
    "Algo deu errado ao processar sua mensagem. Tente novamente em instantes.";

/// Reply asking for the password of a parked encrypted PDF.
const ASK_PASSWORD: &str = "Este PDF está protegido por senha. Responda com a senha \
para eu processá-lo (válida por 5 minutos).";

/// Reply when a password arrives but no PDF is parked (expired or never set).
const NO_PENDING_PDF: &str = "Não há nenhum PDF aguardando senha — o tempo pode ter \
expirado. Envie o arquivo novamente.";

/// Reply when extraction produced no usable entries.
const NOTHING_FOUND: &str = "Não encontrei transações para registrar.";

/// The per-job orchestrator.
pub struct PipelineHandler {
    registry: Arc<StrategyRegistry>,
    pdf_retry: Arc<dyn PdfPasswordEntry>,
    sessions: Arc<dyn SessionStore>,
    transactions: Arc<dyn TransactionRepository>,
    outbound: Arc<dyn OutboundQueue>,
    converter: Option<Arc<dyn CurrencyConverter>>,
    embedder: Option<Arc<dyn EmbeddingBackend>>,
}

impl PipelineHandler {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        pdf_retry: Arc<dyn PdfPasswordEntry>,
        sessions: Arc<dyn SessionStore>,
        transactions: Arc<dyn TransactionRepository>,
        outbound: Arc<dyn OutboundQueue>,
    ) -> Self {
        Self {
            registry,
            pdf_retry,
            sessions,
            transactions,
            outbound,
            converter: None,
            embedder: None,
        }
    }

    /// Attach a currency converter for foreign-currency entries.
    pub fn with_converter(mut self, converter: Arc<dyn CurrencyConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Attach an embedding backend for similarity vectors.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Full per-job flow: dispatch → strategy → result state machine.
    async fn process(&self, job: &Job) -> Result<JsonValue> {
        let result = match job.kind {
            JobKind::RetryPdfPassword => self.run_password_retry(job).await?,
            JobKind::Text => self.run_text(job).await?,
            _ => self.run_media(job).await?,
        };

        self.handle_result(job, result).await
    }

    /// Media kinds: decode the wire payload into an inbound item and invoke
    /// the matching strategy.
    async fn run_media(&self, job: &Job) -> Result<StrategyResult> {
        if !self.registry.has_strategy(job.kind.media_kind()) {
            // Deployment without the matching backend (no vision model, no
            // transcription server). User error reply, not a retry loop.
            return Ok(StrategyResult::SystemError(
                "Este tipo de arquivo não é suportado no momento.".into(),
            ));
        }

        let Some(encoded) = job.payload.media_data.as_deref() else {
            return Ok(StrategyResult::SystemError(
                "Não recebi o arquivo da mensagem.".into(),
            ));
        };

        let data = match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(data) => data,
            Err(_) => {
                return Ok(StrategyResult::SystemError(
                    "O arquivo enviado chegou corrompido.".into(),
                ))
            }
        };

        let item = InboundItem::new(
            data,
            job.payload
                .mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            job.payload
                .filename
                .clone()
                .unwrap_or_else(|| "arquivo".to_string()),
        )
        .with_caption(job.payload.body.clone());

        self.registry.extract(job.kind.media_kind(), &item).await
    }

    /// Text kind: assemble the conversational prompt from session context
    /// plus the new message.
    async fn run_text(&self, job: &Job) -> Result<StrategyResult> {
        let Some(body) = job
            .payload
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
        else {
            return Ok(StrategyResult::SystemError("A mensagem chegou vazia.".into()));
        };

        let context = self.sessions.get_context(&job.user_id).await?;
        let prompt = conversation_prompt(&context, body);

        let item = InboundItem::new(prompt.into_bytes(), "text/plain", "message.txt");
        self.registry.extract(job.kind.media_kind(), &item).await
    }

    /// RetryPdfPassword kind: re-run the PDF strategy on the parked bytes.
    async fn run_password_retry(&self, job: &Job) -> Result<StrategyResult> {
        let Some(password) = job
            .payload
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
        else {
            return Ok(StrategyResult::SystemError("Nenhuma senha informada.".into()));
        };

        let Some(encoded) = self.sessions.get_pending_pdf(&job.user_id).await? else {
            return Ok(StrategyResult::SystemError(NO_PENDING_PDF.into()));
        };

        let data = match base64::engine::general_purpose::STANDARD.decode(&encoded) {
            Ok(data) => data,
            Err(_) => {
                self.sessions.clear_pending_pdf(&job.user_id).await?;
                return Ok(StrategyResult::SystemError(
                    "O PDF guardado estava corrompido. Envie o arquivo novamente.".into(),
                ));
            }
        };

        let item = InboundItem::new(
            data,
            "application/pdf",
            job.payload
                .filename
                .clone()
                .unwrap_or_else(|| "documento.pdf".to_string()),
        );

        let result = self.pdf_retry.retry_with_password(&item, password).await?;

        // The flow returns to idle on success; a wrong password leaves the
        // bytes parked so the user can try again within the TTL.
        if !matches!(result, StrategyResult::SystemError(_)) {
            self.sessions.clear_pending_pdf(&job.user_id).await?;
        }

        Ok(result)
    }

    /// The state machine over strategy results. Every arm enqueues exactly
    /// one reply.
    async fn handle_result(&self, job: &Job, result: StrategyResult) -> Result<JsonValue> {
        match result {
            StrategyResult::DataExtraction(raw) => {
                let (reply, stored) = self.persist_batch(job, &raw).await?;
                self.reply(job, reply).await?;
                Ok(json!({ "outcome": "extraction", "stored": stored }))
            }

            StrategyResult::TextCommand(text) => {
                let mut context = self.sessions.get_context(&job.user_id).await?;
                if let Some(body) = job.payload.body.as_deref().filter(|b| !b.trim().is_empty()) {
                    context.push(SessionTurn::user(body));
                }

                let (reply, outcome) = match parse_embedded(&text) {
                    Some(raw) if raw.has_financial_content() => {
                        let (summary, stored) = self.persist_batch(job, &raw).await?;
                        // Prefer the model's own phrasing when it offered one.
                        let reply = raw
                            .answer
                            .clone()
                            .filter(|a| !a.trim().is_empty())
                            .unwrap_or(summary);
                        (reply, json!({ "outcome": "chat_extraction", "stored": stored }))
                    }
                    _ => (text, json!({ "outcome": "chat" })),
                };

                context.push(SessionTurn::assistant(reply.clone()));
                if context.len() > SESSION_CONTEXT_MAX_TURNS {
                    context.drain(..context.len() - SESSION_CONTEXT_MAX_TURNS);
                }
                // Context is best-effort, last-write-wins; losing a turn is
                // not worth re-running the whole job.
                if let Err(e) = self
                    .sessions
                    .set_context(&job.user_id, &context, SESSION_CONTEXT_TTL_SECS)
                    .await
                {
                    warn!(user_id = %job.user_id, error = %e, "Failed to persist session context");
                }

                self.reply(job, reply).await?;
                Ok(outcome)
            }

            StrategyResult::SystemError(message) => {
                self.reply(job, format!("⚠️ {message}")).await?;
                Ok(json!({ "outcome": "error" }))
            }

            StrategyResult::PdfPasswordRequest(bytes) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                self.sessions
                    .set_pending_pdf(&job.user_id, &encoded, SESSION_PDF_TTL_SECS)
                    .await?;
                self.reply(job, ASK_PASSWORD.to_string()).await?;
                Ok(json!({ "outcome": "password_requested" }))
            }
        }
    }

    /// Normalize → enrich → gate → persist. Returns the reply text and the
    /// stored item count.
    async fn persist_batch(&self, job: &Job, raw: &RawAiResponse) -> Result<(String, usize)> {
        let entries = normalize(raw);
        if entries.is_empty() {
            // No financial content in this turn; a conversational answer
            // beats a dead-end notice when the model offered one.
            let reply = raw
                .answer
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| NOTHING_FOUND.to_string());
            return Ok((reply, 0));
        }

        let services = Enrichment {
            converter: self.converter.as_deref(),
            embedder: self.embedder.as_deref(),
        };
        let items = enrich(entries, &job.user_id, &services).await;
        let batch = confidence::gate(items, raw.confidence_score);

        let ids = self.transactions.create_many(&batch.items).await?;
        info!(
            job_id = %job.id,
            user_id = %job.user_id,
            item_count = ids.len(),
            confidence = confidence::effective_score(raw.confidence_score),
            status = ?batch.status,
            "Batch persisted"
        );

        Ok((batch_summary(&batch), ids.len()))
    }

    /// Enqueue the job's one reply.
    async fn reply(&self, job: &Job, body: String) -> Result<()> {
        self.outbound
            .enqueue(&job.chat_id, OutboundPayload::Text { body })
            .await?;
        Ok(())
    }
}

/// Human-readable per-item summary of a stored batch.
fn batch_summary(batch: &ReviewBatch) -> String {
    let count = batch.items.len();
    let mut lines = Vec::with_capacity(count + 2);

    let header = match (batch.status, count) {
        (ReviewStatus::Confirmed, 1) => "✅ 1 lançamento registrado:".to_string(),
        (ReviewStatus::Confirmed, n) => format!("✅ {n} lançamentos registrados:"),
        (ReviewStatus::PendingReview, 1) => "📝 1 lançamento registrado para revisão:".to_string(),
        (ReviewStatus::PendingReview, n) => {
            format!("📝 {n} lançamentos registrados para revisão:")
        }
    };
    lines.push(header);

    for item in &batch.items {
        let amount = if item.original_currency == "BRL" {
            format!("R$ {:.2}", item.amount)
        } else {
            format!("{} {:.2}", item.original_currency, item.amount)
        };
        lines.push(format!("• {} — {} ({})", item.description, amount, item.category));
    }

    if batch.status == ReviewStatus::PendingReview {
        lines.push("Confira os valores antes de confirmar.".to_string());
    }

    lines.join("\n")
}

#[async_trait]
impl JobHandler for PipelineHandler {
    fn job_kinds(&self) -> Vec<JobKind> {
        vec![
            JobKind::Image,
            JobKind::Audio,
            JobKind::Pdf,
            JobKind::Ofx,
            JobKind::Csv,
            JobKind::Xlsx,
            JobKind::Text,
            JobKind::RetryPdfPassword,
        ]
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        match self.process(&ctx.job).await {
            Ok(outcome) => JobResult::Success(Some(outcome)),
            Err(e) => {
                error!(
                    job_id = %ctx.job.id,
                    job_kind = ?ctx.job.kind,
                    error = %e,
                    "Pipeline job failed"
                );
                // Notify only once the queue has given up; intermediate
                // attempts fail silently into backoff.
                if ctx.final_attempt {
                    if let Err(send_err) = self
                        .outbound
                        .enqueue(
                            &ctx.job.chat_id,
                            OutboundPayload::Text {
                                body: GENERIC_FAILURE.to_string(),
                            },
                        )
                        .await
                    {
                        error!(error = %send_err, "Failed to enqueue failure notification");
                    }
                }
                JobResult::Failed(e.to_string())
            }
        }
    }
}
