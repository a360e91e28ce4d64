//! PDF strategy: text extraction via `pdftotext` (poppler-utils), with the
//! password sub-flow for encrypted documents.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use lanca_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use lanca_core::{
    Error, ExtractionStrategy, GenerationBackend, InboundItem, MediaKind, Result, StrategyResult,
};

use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM};
use crate::strategies::interpret_model_reply;

/// Strategy for PDF statements, invoices, and receipts.
///
/// Extraction shells out to `pdftotext`; encrypted documents surface as
/// [`StrategyResult::PdfPasswordRequest`] so the orchestrator can park the
/// bytes and ask the user for a password. [`PdfStrategy::extract_with_password`]
/// is the retry entry point for the follow-up job.
pub struct PdfStrategy {
    gen: Arc<dyn GenerationBackend>,
}

/// What `pdftotext` produced for a document.
enum PdfText {
    Text(String),
    /// The document requires a user password (or the supplied one is wrong).
    Encrypted,
}

/// Whether pdftotext's stderr indicates a password problem.
fn is_password_error(stderr: &str) -> bool {
    stderr.contains("Incorrect password") || stderr.contains("Command Line Error")
}

impl PdfStrategy {
    pub fn new(gen: Arc<dyn GenerationBackend>) -> Self {
        Self { gen }
    }

    /// Run `pdftotext` over the document, returning the text or the
    /// encrypted marker. Infrastructure failures (missing binary, timeout)
    /// are errors and propagate to the queue.
    async fn pdf_to_text(&self, data: &[u8], password: Option<&str>) -> Result<PdfText> {
        // pdftotext reads from a file path
        let mut tmpfile = NamedTempFile::new()
            .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Internal(format!("Failed to write temp file: {}", e)))?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let mut cmd = Command::new("pdftotext");
        if let Some(pw) = password {
            cmd.arg("-upw").arg(pw);
        }
        cmd.arg("-layout").arg(&tmp_path).arg("-");

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(EXTRACTION_CMD_TIMEOUT_SECS),
            cmd.output(),
        )
        .await
        .map_err(|_| {
            Error::Internal(format!(
                "pdftotext timed out after {}s",
                EXTRACTION_CMD_TIMEOUT_SECS
            ))
        })?
        .map_err(|e| Error::Internal(format!("Failed to execute pdftotext: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_password_error(&stderr) {
                return Ok(PdfText::Encrypted);
            }
            return Err(Error::Extraction(format!(
                "pdftotext failed (exit {}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(PdfText::Text(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }

    /// Shared tail of both entry points: text → model → result.
    async fn extract_from_text(&self, text: &str, caption: Option<&str>) -> Result<StrategyResult> {
        if text.trim().is_empty() {
            // Scanned/image-only PDFs produce no text layer.
            return Ok(StrategyResult::SystemError(
                "Não consegui ler o conteúdo do PDF. Ele pode ser digitalizado sem camada de texto.".into(),
            ));
        }

        let prompt = extraction_prompt(text, caption);
        let reply = self
            .gen
            .generate_with_system(EXTRACTION_SYSTEM, &prompt)
            .await?;

        Ok(interpret_model_reply(reply))
    }

    /// Password retry entry point, invoked with the parked bytes and the
    /// user-supplied password. A wrong password is an expected failure and
    /// comes back as a `SystemError`, never a retry.
    pub async fn extract_with_password(
        &self,
        item: &InboundItem,
        password: &str,
    ) -> Result<StrategyResult> {
        match self.pdf_to_text(&item.data, Some(password)).await? {
            PdfText::Encrypted => {
                warn!(strategy = "pdf", "Supplied PDF password rejected");
                Ok(StrategyResult::SystemError(
                    "Senha incorreta. Envie o PDF novamente para tentar outra vez.".into(),
                ))
            }
            PdfText::Text(text) => self.extract_from_text(&text, item.caption.as_deref()).await,
        }
    }
}

/// Seam for the password-retry entry point, so the orchestrator can be
/// exercised without a poppler installation.
#[async_trait]
pub trait PdfPasswordEntry: Send + Sync {
    /// Re-run extraction on parked bytes with a user-supplied password.
    async fn retry_with_password(
        &self,
        item: &InboundItem,
        password: &str,
    ) -> Result<StrategyResult>;
}

#[async_trait]
impl PdfPasswordEntry for PdfStrategy {
    async fn retry_with_password(
        &self,
        item: &InboundItem,
        password: &str,
    ) -> Result<StrategyResult> {
        self.extract_with_password(item, password).await
    }
}

#[async_trait]
impl ExtractionStrategy for PdfStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Pdf
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        // Validate PDF magic bytes (%PDF)
        if item.data.len() < 4 || &item.data[0..4] != b"%PDF" {
            return Ok(StrategyResult::SystemError(
                "O arquivo enviado não parece ser um PDF válido.".into(),
            ));
        }

        match self.pdf_to_text(&item.data, None).await? {
            PdfText::Encrypted => {
                debug!(strategy = "pdf", "Encrypted PDF, requesting password");
                Ok(StrategyResult::PdfPasswordRequest(item.data.clone()))
            }
            PdfText::Text(text) => self.extract_from_text(&text, item.caption.as_deref()).await,
        }
    }

    async fn health_check(&self) -> Result<bool> {
        // pdftotext prints its version to stderr and exits 0
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf"
    }
}
