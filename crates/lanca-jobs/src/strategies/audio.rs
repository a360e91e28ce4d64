//! Audio strategy: voice notes through transcription + the chat model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use lanca_core::{
    ExtractionStrategy, GenerationBackend, InboundItem, MediaKind, Result, StrategyResult,
};
use lanca_inference::TranscriptionBackend;

use crate::prompts::CONVERSATION_SYSTEM;
use crate::strategies::interpret_model_reply;

/// Strategy for voice notes: transcribe, then treat the transcript as a
/// spoken chat message.
pub struct AudioStrategy {
    transcriber: Arc<dyn TranscriptionBackend>,
    gen: Arc<dyn GenerationBackend>,
}

impl AudioStrategy {
    pub fn new(transcriber: Arc<dyn TranscriptionBackend>, gen: Arc<dyn GenerationBackend>) -> Self {
        Self { transcriber, gen }
    }
}

#[async_trait]
impl ExtractionStrategy for AudioStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        if item.data.is_empty() {
            return Ok(StrategyResult::SystemError(
                "Não consegui processar o áudio enviado.".into(),
            ));
        }

        let transcript = self
            .transcriber
            .transcribe(&item.data, &item.mime_type, Some("pt"))
            .await?;

        if transcript.trim().is_empty() {
            return Ok(StrategyResult::SystemError(
                "Não consegui entender o áudio. Pode tentar de novo?".into(),
            ));
        }

        debug!(
            strategy = "audio",
            transcript_len = transcript.len(),
            "Audio transcribed"
        );

        let reply = self
            .gen
            .generate_with_system(CONVERSATION_SYSTEM, &transcript)
            .await?;

        Ok(interpret_model_reply(reply))
    }

    async fn health_check(&self) -> Result<bool> {
        self.transcriber.health_check().await
    }

    fn name(&self) -> &str {
        "audio"
    }
}
