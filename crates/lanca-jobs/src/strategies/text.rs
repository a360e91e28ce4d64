//! Free-text strategy: a full conversational turn through the model.

use std::sync::Arc;

use async_trait::async_trait;

use lanca_core::{
    Error, ExtractionStrategy, GenerationBackend, InboundItem, MediaKind, Result, StrategyResult,
};

use crate::prompts::CONVERSATION_SYSTEM;

/// Strategy for plain chat messages.
///
/// The caller assembles the full conversational prompt (prior context plus
/// the new message) into the item's data; this strategy only runs the model
/// and hands the reply back as a `TextCommand` for the orchestrator to
/// classify.
pub struct TextStrategy {
    gen: Arc<dyn GenerationBackend>,
}

impl TextStrategy {
    pub fn new(gen: Arc<dyn GenerationBackend>) -> Self {
        Self { gen }
    }
}

#[async_trait]
impl ExtractionStrategy for TextStrategy {
    fn kind(&self) -> MediaKind {
        MediaKind::Text
    }

    async fn extract(&self, item: &InboundItem) -> Result<StrategyResult> {
        let prompt = String::from_utf8_lossy(&item.data).into_owned();
        if prompt.trim().is_empty() {
            return Err(Error::InvalidInput("Empty text message".into()));
        }

        let reply = self
            .gen
            .generate_with_system(CONVERSATION_SYSTEM, &prompt)
            .await?;

        Ok(StrategyResult::TextCommand(reply))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "text"
    }
}
